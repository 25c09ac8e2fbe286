use std::time::Duration;

use reqwest::Client;

const APP_USER_AGENT: &str = "Wowid3Launcher/0.1.0";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}
