use anyhow::Result;
use axum::Router;
use tokio::task::JoinHandle;

/// A router served on an ephemeral localhost port for the lifetime of the value.
#[derive(Debug)]
pub struct TestServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server(router: Router) -> Result<TestServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(TestServer {
        base_url: format!("http://{}", addr),
        handle,
    })
}
