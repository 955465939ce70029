use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::{io::ReaderStream, sync::CancellationToken};

/// The single file a server hands out, and the name it is published under.
#[derive(Debug)]
pub(crate) struct Served {
    path: PathBuf,
    name: String,
}

impl Served {
    pub(crate) fn new(path: PathBuf) -> anyhow::Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("no file name in {}", path.display()))?
            .to_string();
        Ok(Self { path, name })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}

pub(crate) fn router(served: Arc<Served>) -> Router {
    Router::new()
        .route("/{name}", get(serve_file))
        .fallback(not_found)
        .with_state(served)
}

/// Serves `served` to any number of clients until `cancel` fires. Every
/// connection gets its own task and its own file handle.
pub(crate) async fn run(
    served: Served,
    listen: SocketAddr,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    log::info!(
        "serving {} as /{} on {}",
        served.path.display(),
        served.name,
        listener.local_addr()?
    );
    let app = router(Arc::new(served));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
    log::info!("shutting down file server...");
}

async fn serve_file(State(served): State<Arc<Served>>, Path(name): Path<String>) -> Response {
    if name != served.name {
        return not_found().await.into_response();
    }

    let file = match tokio::fs::File::open(&served.path).await {
        Ok(file) => file,
        Err(e) => {
            log::error!("opening {}: {}", served.path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            log::error!("stat {}: {}", served.path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    log::debug!("client connected for /{}", name);
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "lite-av-{}-{}.bin",
            tag,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn serves_the_file_by_name() -> anyhow::Result<()> {
        let path = temp_file("by-name", b"0123456789");
        let served = Arc::new(Served::new(path.clone())?);
        let name = served.name().to_string();

        let resp = serve_file(State(served.clone()), Path(name)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "10");
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"0123456789");

        let resp = serve_file(State(served), Path("other.bin".to_string())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        std::fs::remove_file(path)?;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_clients_get_independent_streams() -> anyhow::Result<()> {
        let served = Arc::new(Served::new(temp_file("concurrent", &[7u8; 4096]))?);
        let name = served.name().to_string();
        let clients = (0..4).map(|_| {
            let served = served.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let resp = serve_file(State(served), Path(name)).await;
                axum::body::to_bytes(resp.into_body(), usize::MAX).await
            })
        });
        for client in clients.collect::<Vec<_>>() {
            assert_eq!(client.await??.len(), 4096);
        }
        Ok(())
    }

    #[test]
    fn name_comes_from_the_path() {
        let served = Served::new(PathBuf::from("/media/clip.mp4")).unwrap();
        assert_eq!(served.name(), "clip.mp4");
        assert!(Served::new(PathBuf::from("/")).is_err());
    }
}
