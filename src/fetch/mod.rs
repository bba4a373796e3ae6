pub mod delay;
pub mod error;
pub mod paged;
pub mod retry;

#[cfg(test)]
pub(crate) mod testing {
    use super::delay::Sleeper;
    use super::error::FetchError;
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Records requested sleeps instead of sleeping.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSleeper {
        calls: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub(crate) fn calls(&self) -> Vec<Duration> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
            self.calls.lock().unwrap().push(duration);
            std::future::ready(())
        }
    }

    pub(crate) fn decode_error() -> FetchError {
        FetchError::Decode {
            url: "https://example.invalid/page".to_string(),
            source: serde_json::from_str::<serde_json::Value>("{\"response\":").unwrap_err(),
        }
    }

    pub(crate) fn network_error() -> FetchError {
        let error = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        FetchError::NetworkRequest("not a url".to_string(), error)
    }

    /// An HTTP client that talks to [`serve`] directly, ignoring any proxy in the environment.
    pub(crate) fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// A local HTTP endpoint answering successive requests with `replies` (status, JSON body) in
    /// order, repeating the last one. Returns the endpoint URL and the request lines received.
    pub(crate) async fn serve(replies: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut replies = replies.into_iter();
            let mut current = (404u16, String::new());
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => head.extend_from_slice(&chunk[..n]),
                    }
                }
                let line = String::from_utf8_lossy(&head)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(line);
                if let Some(next) = replies.next() {
                    current = next;
                }
                let (status, body) = &current;
                let response = format!(
                    "HTTP/1.1 {} Test\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (url, requests)
    }
}
