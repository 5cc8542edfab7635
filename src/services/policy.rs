//! Who may do what to an order. Every operation consults this module instead
//! of comparing ids inline.

use uuid::Uuid;

use crate::{
    entity::orders::Model as OrderModel,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    View,
    ViewPickupAddress,
    ViewPickupCode,
    Cancel,
    RetryCheckout,
    UpdateStatus,
    UpdateTracking,
    ConfirmPickup,
    OpenDispute,
    RespondDispute,
    Review,
}

/// Identity-level capabilities. Status preconditions are checked by the
/// operations themselves so they can report a conflict instead of a 403.
pub fn permitted_actions(
    actor: &AuthUser,
    buyer_id: Uuid,
    seller_id: Uuid,
    status: OrderStatus,
) -> Vec<OrderAction> {
    use OrderAction::*;

    let mut actions = Vec::new();
    if actor.user_id == buyer_id {
        actions.extend([View, ViewPickupCode, Cancel, RetryCheckout, OpenDispute, Review]);
        if status != OrderStatus::Pending {
            actions.push(ViewPickupAddress);
        }
    }
    if actor.user_id == seller_id {
        actions.extend([
            View,
            ViewPickupAddress,
            Cancel,
            UpdateStatus,
            UpdateTracking,
            ConfirmPickup,
            RespondDispute,
            Review,
        ]);
    }
    if actor.is_admin() {
        actions.extend([
            View,
            ViewPickupAddress,
            ViewPickupCode,
            Cancel,
            UpdateStatus,
            UpdateTracking,
            ConfirmPickup,
        ]);
    }
    actions
}

pub fn allows(actor: &AuthUser, order: &OrderModel, action: OrderAction) -> bool {
    permitted_actions(actor, order.buyer_id, order.seller_id, order.status).contains(&action)
}

/// Strangers get `NotFound` so order ids cannot be probed. Parties without the
/// capability get `Forbidden`.
pub fn ensure(actor: &AuthUser, order: &OrderModel, action: OrderAction) -> AppResult<()> {
    let actions = permitted_actions(actor, order.buyer_id, order.seller_id, order.status);
    if !actions.contains(&OrderAction::View) {
        return Err(AppError::NotFound);
    }
    if !actions.contains(&action) {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Strip fields the viewer may not see.
pub fn redact(actor: &AuthUser, mut order: Order) -> Order {
    let actions = permitted_actions(actor, order.buyer_id, order.seller_id, order.status);
    if !actions.contains(&OrderAction::ViewPickupAddress) {
        order.pickup_address = None;
        order.pickup_instructions = None;
    }
    if !actions.contains(&OrderAction::ViewPickupCode) {
        order.pickup_code = None;
        order.pickup_code_expires_at = None;
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Uuid, role: &str) -> AuthUser {
        AuthUser {
            user_id: id,
            role: role.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn buyer_and_seller_get_disjoint_dispute_rights() {
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let b = permitted_actions(&user(buyer, "user"), buyer, seller, OrderStatus::Paid);
        let s = permitted_actions(&user(seller, "user"), buyer, seller, OrderStatus::Paid);

        assert!(b.contains(&OrderAction::OpenDispute));
        assert!(!b.contains(&OrderAction::RespondDispute));
        assert!(!b.contains(&OrderAction::ConfirmPickup));
        assert!(s.contains(&OrderAction::RespondDispute));
        assert!(s.contains(&OrderAction::ConfirmPickup));
        assert!(!s.contains(&OrderAction::OpenDispute));
        assert!(!s.contains(&OrderAction::ViewPickupCode));
    }

    #[test]
    fn unpaid_buyer_cannot_see_pickup_address() {
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = user(buyer, "user");
        let pending = permitted_actions(&actor, buyer, seller, OrderStatus::Pending);
        let paid = permitted_actions(&actor, buyer, seller, OrderStatus::Paid);
        assert!(!pending.contains(&OrderAction::ViewPickupAddress));
        assert!(paid.contains(&OrderAction::ViewPickupAddress));
    }

    #[test]
    fn strangers_have_no_rights_and_admins_cannot_open_disputes() {
        let (buyer, seller) = (Uuid::new_v4(), Uuid::new_v4());
        let stranger = permitted_actions(&user(Uuid::new_v4(), "user"), buyer, seller, OrderStatus::Paid);
        assert!(stranger.is_empty());

        let admin = permitted_actions(&user(Uuid::new_v4(), "admin"), buyer, seller, OrderStatus::Paid);
        assert!(admin.contains(&OrderAction::UpdateStatus));
        assert!(admin.contains(&OrderAction::ViewPickupCode));
        assert!(!admin.contains(&OrderAction::OpenDispute));
    }
}
