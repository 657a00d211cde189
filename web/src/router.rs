use axum::routing::{get, post};
use axum::Router;

use crate::controller::AlipayController;
use crate::AppState;

pub fn routers(state: AppState) -> Router {
    Router::new()
        .nest(
            "/alipay",
            Router::new()
                .route("/pay/:gateway", get(AlipayController::pay))
                .route("/notify", post(AlipayController::notify))
                .route("/find/:order", get(AlipayController::find))
                .route("/find_refund/:order", get(AlipayController::find_refund))
                .route("/refund", post(AlipayController::refund))
                .route("/cancel/:order", post(AlipayController::cancel))
                .route("/close/:order", post(AlipayController::close))
                .route("/bill/:date", get(AlipayController::download)),
        )
        .with_state(state)
}
