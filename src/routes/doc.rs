use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{
            AwardWinnersRequest, BalanceReconciliation, CreateAwardRequest, DisputeOutcome,
            IssueStrikeRequest, LedgerAdjustmentRequest, LedgerAdjustmentResult, OverdueDispute,
            OverdueDisputeList, PeriodWinners, ResolveDisputeRequest, RestockRequest,
            RestockResult, StrikeList, StrikeSummary,
        },
        disputes::{DisputeWithOrder, OpenDisputeRequest, RespondDisputeRequest},
        eco::{
            AwardList, CommunityStats, HallOfFame, Leaderboard, LeaderboardEntry, LedgerHistory,
            MyRank, RedeemRequest, RedeemResult, Reward, RewardCatalog,
        },
        orders::{
            CancelOrderRequest, CheckoutRedirect, ConfirmPickupRequest, CreateOrderRequest,
            CreateReviewRequest, OrderList, PickupCodeView, ReviewCreated, TrackingRequest,
            UpdateStatusRequest,
        },
    },
    models::{
        Award, AwardType, DeliveryType, Dispute, DisputeReason, DisputeStatus, ImpactAction,
        LedgerEntry, Order, OrderStatus, PeriodType, Review, RewardType, Strike, StrikeType,
    },
    response::{ApiResponse, Meta},
    routes::{admin, eco, health, orders, params, webhooks},
    services::payment_service::WebhookOutcome,
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::create_order,
        orders::list_my_orders,
        orders::list_seller_orders,
        orders::get_order,
        orders::update_status,
        orders::update_tracking,
        orders::cancel_order,
        orders::retry_checkout,
        orders::get_pickup_code,
        orders::confirm_pickup,
        orders::open_dispute,
        orders::get_dispute,
        orders::respond_to_dispute,
        orders::create_review,
        webhooks::payment_webhook,
        eco::leaderboard,
        eco::my_rank,
        eco::community_stats,
        eco::hall_of_fame,
        eco::my_awards,
        eco::history,
        eco::rewards,
        eco::redeem,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::restock_listing,
        admin::overdue_disputes,
        admin::escalate_dispute,
        admin::resolve_dispute,
        admin::issue_strike,
        admin::revoke_strike,
        admin::user_strikes,
        admin::reconcile_balance,
        admin::adjust_ledger,
        admin::create_award,
        admin::award_period_winners
    ),
    components(
        schemas(
            OrderStatus,
            DeliveryType,
            DisputeReason,
            DisputeStatus,
            ImpactAction,
            StrikeType,
            PeriodType,
            RewardType,
            AwardType,
            Award,
            Order,
            Dispute,
            LedgerEntry,
            Strike,
            Review,
            CreateOrderRequest,
            CheckoutRedirect,
            UpdateStatusRequest,
            TrackingRequest,
            CancelOrderRequest,
            ConfirmPickupRequest,
            PickupCodeView,
            CreateReviewRequest,
            ReviewCreated,
            OrderList,
            OpenDisputeRequest,
            RespondDisputeRequest,
            DisputeWithOrder,
            LeaderboardEntry,
            Leaderboard,
            MyRank,
            CommunityStats,
            LedgerHistory,
            Reward,
            RewardCatalog,
            RedeemRequest,
            RedeemResult,
            HallOfFame,
            AwardList,
            CreateAwardRequest,
            AwardWinnersRequest,
            PeriodWinners,
            RestockRequest,
            RestockResult,
            DisputeOutcome,
            ResolveDisputeRequest,
            OverdueDispute,
            OverdueDisputeList,
            IssueStrikeRequest,
            StrikeSummary,
            StrikeList,
            LedgerAdjustmentRequest,
            LedgerAdjustmentResult,
            BalanceReconciliation,
            WebhookOutcome,
            params::Pagination,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<CheckoutRedirect>,
            ApiResponse<DisputeWithOrder>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Disputes", description = "Dispute endpoints for buyers and sellers"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
        (name = "Eco", description = "Eco-credit ledger, leaderboard, awards and rewards"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
