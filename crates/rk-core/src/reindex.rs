//! # Position Reindexer
//!
//! Keeps the positions of every container dense: the children of a list (or
//! the lists of a board) always sit at exactly `0..n`.
//!
//! Work is split in two. The `plan_*` functions are pure and decide which
//! sibling ranges shift and by how much. The async functions replay a plan
//! against a [`UnitOfWork`]; the caller owns the transaction and commits it.

use crate::error::{AppError, Result};
use crate::models::{ItemKind, Placement};
use crate::traits::{PositionRange, UnitOfWork};
use log::debug;
use uuid::Uuid;

/// A bulk position adjustment inside one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub container_id: Uuid,
    pub range: PositionRange,
    pub delta: i64,
}

/// What a move has to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovePlan {
    /// The item already sits where it was asked to go.
    Unchanged,
    Relocate {
        from: Placement,
        to: Placement,
        shifts: Vec<Shift>,
    },
}

/// Where a new item goes and which siblings make room for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPlan {
    pub position: i64,
    pub shift: Option<Shift>,
}

/// Rejects negative positions before anything touches the store.
pub fn check_position(position: i64) -> Result<()> {
    if position < 0 {
        return Err(AppError::ValidationError(format!(
            "position must be non-negative, got {position}"
        )));
    }
    Ok(())
}

/// Plans moving `current` to `requested` inside `destination`.
///
/// `destination_len` counts the destination's children *other than* the
/// moved item, so positions past it clamp to the end.
pub fn plan_move(
    current: Placement,
    destination: Uuid,
    requested: i64,
    destination_len: i64,
) -> MovePlan {
    let p_old = current.position;
    let p_new = requested.clamp(0, destination_len.max(0));

    let shifts = if current.container_id == destination {
        if p_old == p_new {
            return MovePlan::Unchanged;
        }
        if p_old < p_new {
            vec![Shift {
                container_id: destination,
                range: PositionRange::between(p_old + 1, p_new),
                delta: -1,
            }]
        } else {
            vec![Shift {
                container_id: destination,
                range: PositionRange::between(p_new, p_old - 1),
                delta: 1,
            }]
        }
    } else {
        vec![
            Shift {
                container_id: current.container_id,
                range: PositionRange::starting_at(p_old + 1),
                delta: -1,
            },
            Shift {
                container_id: destination,
                range: PositionRange::starting_at(p_new),
                delta: 1,
            },
        ]
    };

    MovePlan::Relocate {
        from: current,
        to: Placement { id: current.id, container_id: destination, position: p_new },
        shifts,
    }
}

/// Plans inserting into a container that currently holds `len` children.
/// `None` appends; explicit positions clamp to `[0, len]`.
pub fn plan_insert(container_id: Uuid, requested: Option<i64>, len: i64) -> InsertPlan {
    let len = len.max(0);
    match requested {
        Some(position) if position < len => {
            let position = position.max(0);
            InsertPlan {
                position,
                shift: Some(Shift {
                    container_id,
                    range: PositionRange::starting_at(position),
                    delta: 1,
                }),
            }
        }
        _ => InsertPlan { position: len, shift: None },
    }
}

/// The shift that closes the hole left by removing `removed`.
pub fn plan_removal(removed: Placement) -> Shift {
    Shift {
        container_id: removed.container_id,
        range: PositionRange::starting_at(removed.position + 1),
        delta: -1,
    }
}

async fn apply_shift(uow: &mut dyn UnitOfWork, kind: ItemKind, shift: &Shift) -> Result<()> {
    let touched = uow
        .shift_positions(kind, shift.container_id, shift.range, shift.delta)
        .await?;
    debug!(
        "shifted {touched} {kind} rows in {} {} by {:+}",
        kind.container_name(),
        shift.container_id,
        shift.delta
    );
    Ok(())
}

/// Moves an item, adjusting siblings in the source and destination.
///
/// Returns the item's placement after the move. Fails with `NotFound` when
/// either the item or the destination container is missing, and with
/// `ValidationError` for a negative position.
pub async fn relocate(
    uow: &mut dyn UnitOfWork,
    kind: ItemKind,
    id: Uuid,
    destination: Uuid,
    requested: i64,
) -> Result<Placement> {
    check_position(requested)?;

    let current = uow
        .find_placement(kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.name(), id))?;

    if !uow.container_exists(kind, destination).await? {
        return Err(AppError::not_found(kind.container_name(), destination));
    }

    let mut destination_len = uow.count_children(kind, destination).await?;
    if current.container_id == destination {
        destination_len -= 1;
    }

    match plan_move(current, destination, requested, destination_len) {
        MovePlan::Unchanged => Ok(current),
        MovePlan::Relocate { from, to, shifts } => {
            for shift in &shifts {
                apply_shift(uow, kind, shift).await?;
            }
            let reparent = (from.container_id != to.container_id).then_some(to.container_id);
            uow.update_placement(kind, id, reparent, to.position).await?;
            Ok(to)
        }
    }
}

/// Makes room for a new child and returns the position it should take.
///
/// The caller inserts the row itself, in the same unit of work.
pub async fn open_slot(
    uow: &mut dyn UnitOfWork,
    kind: ItemKind,
    container_id: Uuid,
    requested: Option<i64>,
) -> Result<i64> {
    if let Some(position) = requested {
        check_position(position)?;
    }
    if !uow.container_exists(kind, container_id).await? {
        return Err(AppError::not_found(kind.container_name(), container_id));
    }

    let len = uow.count_children(kind, container_id).await?;
    let plan = plan_insert(container_id, requested, len);
    if let Some(shift) = &plan.shift {
        apply_shift(uow, kind, shift).await?;
    }
    Ok(plan.position)
}

/// Deletes an item (cascading to its children) and closes the gap it leaves.
pub async fn remove(uow: &mut dyn UnitOfWork, kind: ItemKind, id: Uuid) -> Result<Placement> {
    let removed = uow
        .find_placement(kind, id)
        .await?
        .ok_or_else(|| AppError::not_found(kind.name(), id))?;

    uow.delete_item(kind, id).await?;
    apply_shift(uow, kind, &plan_removal(removed)).await?;
    Ok(removed)
}

/// Checks that a container's children sit at exactly `0..n`.
pub async fn audit(uow: &mut dyn UnitOfWork, kind: ItemKind, container_id: Uuid) -> Result<()> {
    let children = uow.list_children(kind, container_id).await?;
    let broken = children
        .iter()
        .enumerate()
        .find(|(index, child)| child.position != *index as i64);

    match broken {
        None => Ok(()),
        Some((index, child)) => Err(AppError::Internal(format!(
            "{} {container_id} is not dense: {kind} {} sits at {} instead of {index}",
            kind.container_name(),
            child.id,
            child.position
        ))),
    }
}

/// Renumbers a container's children to `0..n`, keeping their current order.
/// Returns how many rows were rewritten.
pub async fn compact(uow: &mut dyn UnitOfWork, kind: ItemKind, container_id: Uuid) -> Result<usize> {
    let children = uow.list_children(kind, container_id).await?;
    let mut rewritten = 0;
    for (index, child) in children.iter().enumerate() {
        let index = index as i64;
        if child.position != index {
            uow.update_placement(kind, child.id, None, index).await?;
            rewritten += 1;
        }
    }
    Ok(rewritten)
}
