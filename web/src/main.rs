use std::net::SocketAddr;
use std::sync::Arc;

use common::Application;
use pay::AliPay;

mod controller;
mod router;

#[derive(Clone)]
pub struct AppState {
    pub alipay: Arc<AliPay>,
}

#[tokio::main]
async fn main() {
    let application = match Application::init().await {
        Ok(application) => application,
        Err(e) => {
            eprintln!("application load err: {}", e);
            std::process::exit(-1);
        }
    };

    common::init_tracing(&application.log_level);

    let alipay = match AliPay::new(&application.alipay) {
        Ok(alipay) => alipay,
        Err(e) => {
            tracing::error!("alipay config err: {}", e);
            std::process::exit(-1);
        }
    };

    let addr = match application.addr().parse::<SocketAddr>() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("invalid listen address {}: {}", application.addr(), e);
            std::process::exit(-1);
        }
    };

    let state = AppState {
        alipay: Arc::new(alipay),
    };

    tracing::info!("web-srv run at: {}", addr);
    if let Err(e) = axum::Server::bind(&addr)
        .serve(router::routers(state).into_make_service())
        .await
    {
        tracing::error!("server err: {}", e);
    }
}
