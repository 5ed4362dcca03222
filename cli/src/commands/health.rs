use crate::util::{print_response, send};

pub async fn run(api_url: &str) -> i32 {
    match send(api_url, reqwest::Method::GET, "/health", None, None, None).await {
        Ok(response) => print_response(&response, false),
        Err(code) => code,
    }
}
