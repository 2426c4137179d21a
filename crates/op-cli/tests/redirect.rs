use anyhow::Result;
use op_cli::redirect;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt}, net::{TcpListener, TcpStream}
};

async fn fetch(addr: std::net::SocketAddr, request: &str) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8_lossy(&response).to_lowercase())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_path_redirects_to_project_page() -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(redirect::serve(listener, "https://github.com/fasmide/onionpass".to_string()));

    for request in [
        "GET / HTTP/1.1\r\nHost: gateway\r\nConnection: close\r\n\r\n",
        "GET /some/deep/path?q=1 HTTP/1.1\r\nHost: gateway\r\nConnection: close\r\n\r\n",
        "POST /submit HTTP/1.1\r\nHost: gateway\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    ] {
        let response = fetch(addr, request).await?;
        assert!(response.starts_with("http/1.1 302 found"), "unexpected response: {response}");
        assert!(
            response.contains("location: https://github.com/fasmide/onionpass"),
            "missing location header: {response}"
        );
    }
    Ok(())
}
