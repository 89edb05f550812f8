//! Lists are positioned within their board exactly like cards within a list.

use integration_tests::{pairs, Harness};
use rk_core::{AppError, ItemKind, NewList};
use uuid::Uuid;

async fn list_titles(h: &Harness, board_id: Uuid) -> Vec<(String, i64)> {
    h.service
        .lists(board_id)
        .await
        .unwrap()
        .into_iter()
        .map(|l| (l.title, l.position))
        .collect()
}

async fn named_lists(h: &Harness, board_id: Uuid, titles: &[&str]) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for title in titles {
        let list = h
            .service
            .create_list(board_id, NewList { title: (*title).into(), position: None })
            .await
            .unwrap();
        ids.push(list.id);
    }
    ids
}

#[tokio::test]
async fn test_lists_append_in_creation_order() {
    let h = Harness::in_memory().await;
    let board = h.board().await;
    named_lists(&h, board, &["To Do", "Doing", "Done"]).await;

    assert_eq!(
        list_titles(&h, board).await,
        pairs(&[("To Do", 0), ("Doing", 1), ("Done", 2)])
    );
}

#[tokio::test]
async fn test_reorder_lists_on_board() {
    let h = Harness::in_memory().await;
    let board = h.board().await;
    let ids = named_lists(&h, board, &["To Do", "Doing", "Done"]).await;

    let moved = h.service.move_list(ids[2], board, 0).await.unwrap();

    assert_eq!(moved.position, 0);
    assert_eq!(
        list_titles(&h, board).await,
        pairs(&[("Done", 0), ("To Do", 1), ("Doing", 2)])
    );
}

#[tokio::test]
async fn test_move_list_to_another_board() {
    let h = Harness::in_memory().await;
    let home = h.board().await;
    let away = h.board().await;
    let ids = named_lists(&h, home, &["A", "B", "C"]).await;
    named_lists(&h, away, &["X"]).await;

    let moved = h.service.move_list(ids[0], away, 1).await.unwrap();

    assert_eq!(moved.board_id, away);
    assert_eq!(list_titles(&h, home).await, pairs(&[("B", 0), ("C", 1)]));
    assert_eq!(list_titles(&h, away).await, pairs(&[("X", 0), ("A", 1)]));
}

#[tokio::test]
async fn test_insert_list_at_front() {
    let h = Harness::in_memory().await;
    let board = h.board().await;
    named_lists(&h, board, &["A", "B"]).await;

    h.service
        .create_list(board, NewList { title: "First".into(), position: Some(0) })
        .await
        .unwrap();

    assert_eq!(
        list_titles(&h, board).await,
        pairs(&[("First", 0), ("A", 1), ("B", 2)])
    );
}

#[tokio::test]
async fn test_delete_list_closes_gap_and_drops_cards() {
    let h = Harness::in_memory().await;
    let board = h.board().await;
    let (first, _) = h.list_with_cards(board, &["a"]).await;
    let (middle, cards) = h.list_with_cards(board, &["b", "c"]).await;
    let (last, _) = h.list_with_cards(board, &["d"]).await;

    h.service.delete_list(middle.id).await.unwrap();

    let lists = h.service.lists(board).await.unwrap();
    let ids: Vec<Uuid> = lists.iter().map(|l| l.id).collect();
    assert_eq!(ids, [first.id, last.id]);
    h.assert_dense(ItemKind::List, board).await;

    let err = h.service.move_card(cards[0].id, first.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref what, _) if what == "Card"));
}

#[tokio::test]
async fn test_move_list_to_unknown_board_is_not_found() {
    let h = Harness::in_memory().await;
    let board = h.board().await;
    let ids = named_lists(&h, board, &["A"]).await;

    let err = h.service.move_list(ids[0], Uuid::now_v7(), 0).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(ref what, _) if what == "Board"));
    assert_eq!(list_titles(&h, board).await, pairs(&[("A", 0)]));
}
