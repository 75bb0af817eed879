use std::future::Future;

use tokio::net::TcpListener;

use crate::{router::router, state::State};

pub async fn serve<F>(state: State, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("listening on {:?}", listener.local_addr()?);

    let app = router(state.store, state.max_body_size, state.metrics);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
