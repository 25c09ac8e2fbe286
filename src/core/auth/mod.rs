// ─── Microsoft Account Sign-in ───
// Device-code OAuth against the consumer Microsoft endpoints, then the
// Xbox Live → XSTS → Minecraft services chain. The launcher never sees a
// password: the user enters a short code at microsoft.com/link and we poll
// the token endpoint until consent lands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::error::{LauncherError, LauncherResult};

const MICROSOFT_CLIENT_ID: &str = "00000000402b5328";
const DEVICE_CODE_URL: &str =
    "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode";
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
const OAUTH_SCOPE: &str = "XboxLive.signin offline_access";

const XBOX_LIVE_AUTH_URL: &str = "https://user.auth.xboxlive.com/user/authenticate";
const XSTS_AUTH_URL: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
const MINECRAFT_AUTH_URL: &str =
    "https://api.minecraftservices.com/authentication/login_with_xbox";
const MINECRAFT_PROFILE_URL: &str = "https://api.minecraftservices.com/minecraft/profile";
const MINECRAFT_ENTITLEMENTS_URL: &str =
    "https://api.minecraftservices.com/entitlements/mcstore";

/// XSTS error: the Microsoft account has no Xbox profile.
const XERR_NO_XBOX_ACCOUNT: u64 = 2_148_916_233;
/// XSTS error: the account is a child and needs family consent.
const XERR_CHILD_ACCOUNT: u64 = 2_148_916_238;

const ACCOUNT_FILE: &str = "account.json";

/// The signed-in player as the rest of the launcher sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinecraftProfile {
    pub uuid: String,
    pub username: String,
    pub access_token: String,
    pub skin_url: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl MinecraftProfile {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            None => false,
        }
    }

    /// Whether the access token should be refreshed before the next use.
    ///
    /// Applies a five minute buffer so a token never expires mid-launch.
    /// A profile without expiry information is treated as stale.
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + chrono::Duration::minutes(5),
            None => true,
        }
    }
}

/// What the UI shows the user while we wait for them to enter the code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeInfo {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    pub interval: u64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct TokenPollResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
struct MicrosoftToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: u64,
}

// ── Xbox / Minecraft service DTOs ───────────────────────

#[derive(Debug, Serialize)]
struct XboxLiveAuthRequest<'a> {
    #[serde(rename = "Properties")]
    properties: XboxLiveProperties<'a>,
    #[serde(rename = "RelyingParty")]
    relying_party: &'a str,
    #[serde(rename = "TokenType")]
    token_type: &'a str,
}

#[derive(Debug, Serialize)]
struct XboxLiveProperties<'a> {
    #[serde(rename = "AuthMethod")]
    auth_method: &'a str,
    #[serde(rename = "SiteName")]
    site_name: &'a str,
    #[serde(rename = "RpsTicket")]
    rps_ticket: String,
}

#[derive(Debug, Serialize)]
struct XstsAuthRequest<'a> {
    #[serde(rename = "Properties")]
    properties: XstsProperties<'a>,
    #[serde(rename = "RelyingParty")]
    relying_party: &'a str,
    #[serde(rename = "TokenType")]
    token_type: &'a str,
}

#[derive(Debug, Serialize)]
struct XstsProperties<'a> {
    #[serde(rename = "SandboxId")]
    sandbox_id: &'a str,
    #[serde(rename = "UserTokens")]
    user_tokens: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct XboxAuthResponse {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "DisplayClaims")]
    display_claims: DisplayClaims,
}

#[derive(Debug, Deserialize)]
struct DisplayClaims {
    xui: Vec<XuiClaim>,
}

#[derive(Debug, Deserialize)]
struct XuiClaim {
    uhs: String,
}

#[derive(Debug, Deserialize)]
struct XstsErrorResponse {
    #[serde(rename = "XErr")]
    xerr: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MinecraftAuthResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct MinecraftProfileResponse {
    id: String,
    name: String,
    #[serde(default)]
    skins: Vec<MinecraftSkin>,
}

#[derive(Debug, Deserialize)]
struct MinecraftSkin {
    url: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntitlementsResponse {
    #[serde(default)]
    items: Vec<EntitlementItem>,
}

#[derive(Debug, Deserialize)]
struct EntitlementItem {
    name: String,
}

// ── Device-code flow ────────────────────────────────────

/// Ask Microsoft for a device code the user can enter in a browser.
pub async fn request_device_code(client: &reqwest::Client) -> LauncherResult<DeviceCodeInfo> {
    let response = client
        .post(DEVICE_CODE_URL)
        .form(&[("client_id", MICROSOFT_CLIENT_ID), ("scope", OAUTH_SCOPE)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "device code endpoint returned {}",
            status
        )));
    }

    let info = response.json::<DeviceCodeInfo>().await?;
    info!("Device code issued, expires in {}s", info.expires_in);
    Ok(info)
}

/// Poll the token endpoint until the user completes (or abandons) consent.
async fn poll_device_token(
    client: &reqwest::Client,
    device: &DeviceCodeInfo,
) -> LauncherResult<MicrosoftToken> {
    let mut interval = Duration::from_secs(device.interval.max(1));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(device.expires_in);

    loop {
        if tokio::time::Instant::now() >= deadline {
            return Err(LauncherError::Timeout("device code expired".into()));
        }
        tokio::time::sleep(interval).await;

        let response = client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", MICROSOFT_CLIENT_ID),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                ("device_code", device.device_code.as_str()),
            ])
            .send()
            .await?;

        let poll = response.json::<TokenPollResponse>().await?;

        if let Some(access_token) = poll.access_token {
            return Ok(MicrosoftToken {
                access_token,
                refresh_token: poll.refresh_token,
                expires_in: poll.expires_in.unwrap_or(3600),
            });
        }

        match poll.error.as_deref() {
            Some("authorization_pending") => {
                debug!("Device code not yet authorized, polling again");
            }
            Some("slow_down") => {
                interval += Duration::from_secs(5);
            }
            Some("expired_token") => {
                return Err(LauncherError::Timeout("device code expired".into()));
            }
            Some("authorization_declined") => {
                return Err(LauncherError::AuthDeclined(
                    "the sign-in request was declined".into(),
                ));
            }
            Some(other) => {
                return Err(LauncherError::AuthProtocol(format!(
                    "token endpoint error: {other}"
                )));
            }
            None => {
                return Err(LauncherError::AuthProtocol(
                    "token endpoint returned neither a token nor an error".into(),
                ));
            }
        }
    }
}

// ── Xbox / Minecraft chain ──────────────────────────────

async fn xbox_live_authenticate(
    client: &reqwest::Client,
    ms_access_token: &str,
) -> LauncherResult<(String, String)> {
    let request = XboxLiveAuthRequest {
        properties: XboxLiveProperties {
            auth_method: "RPS",
            site_name: "user.auth.xboxlive.com",
            rps_ticket: format!("d={}", ms_access_token),
        },
        relying_party: "http://auth.xboxlive.com",
        token_type: "JWT",
    };

    let response = client.post(XBOX_LIVE_AUTH_URL).json(&request).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "Xbox Live authentication returned {}",
            status
        )));
    }

    let xbox = response.json::<XboxAuthResponse>().await?;
    let user_hash = xbox
        .display_claims
        .xui
        .first()
        .ok_or_else(|| LauncherError::AuthProtocol("no user hash in Xbox Live response".into()))?
        .uhs
        .clone();

    Ok((xbox.token, user_hash))
}

async fn xsts_authorize(
    client: &reqwest::Client,
    xbox_token: &str,
) -> LauncherResult<(String, String)> {
    let request = XstsAuthRequest {
        properties: XstsProperties {
            sandbox_id: "RETAIL",
            user_tokens: vec![xbox_token],
        },
        relying_party: "rp://api.minecraftservices.com/",
        token_type: "JWT",
    };

    let response = client.post(XSTS_AUTH_URL).json(&request).send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        let detail = response.json::<XstsErrorResponse>().await.ok();
        let reason = match detail.and_then(|d| d.xerr) {
            Some(XERR_NO_XBOX_ACCOUNT) => {
                "this Microsoft account has no Xbox profile".to_string()
            }
            Some(XERR_CHILD_ACCOUNT) => {
                "this account is a child account and needs family consent".to_string()
            }
            Some(code) => format!("Xbox security services refused the sign-in (XErr {code})"),
            None => "Xbox security services refused the sign-in".to_string(),
        };
        return Err(LauncherError::AuthDeclined(reason));
    }

    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "XSTS authorization returned {}",
            status
        )));
    }

    let xsts = response.json::<XboxAuthResponse>().await?;
    let user_hash = xsts
        .display_claims
        .xui
        .first()
        .ok_or_else(|| LauncherError::AuthProtocol("no user hash in XSTS response".into()))?
        .uhs
        .clone();

    Ok((xsts.token, user_hash))
}

async fn minecraft_login(
    client: &reqwest::Client,
    xsts_token: &str,
    user_hash: &str,
) -> LauncherResult<MinecraftAuthResponse> {
    let identity_token = format!("XBL3.0 x={};{}", user_hash, xsts_token);
    let response = client
        .post(MINECRAFT_AUTH_URL)
        .json(&serde_json::json!({ "identityToken": identity_token }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "Minecraft services login returned {}",
            status
        )));
    }

    Ok(response.json::<MinecraftAuthResponse>().await?)
}

async fn owns_minecraft(client: &reqwest::Client, mc_token: &str) -> LauncherResult<bool> {
    let response = client
        .get(MINECRAFT_ENTITLEMENTS_URL)
        .bearer_auth(mc_token)
        .send()
        .await?;

    if !response.status().is_success() {
        return Ok(false);
    }

    let entitlements = response.json::<EntitlementsResponse>().await?;
    Ok(entitlements
        .items
        .iter()
        .any(|item| item.name == "product_minecraft" || item.name == "game_minecraft"))
}

async fn fetch_profile(
    client: &reqwest::Client,
    mc_token: &str,
) -> LauncherResult<MinecraftProfileResponse> {
    let response = client
        .get(MINECRAFT_PROFILE_URL)
        .bearer_auth(mc_token)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "Minecraft profile fetch returned {}",
            status
        )));
    }

    Ok(response.json::<MinecraftProfileResponse>().await?)
}

/// Complete a sign-in that started with [`request_device_code`].
///
/// Blocks (asynchronously) until the user finishes consent or the code
/// expires, then walks the Xbox Live → XSTS → Minecraft chain and checks
/// the account actually owns the game.
pub async fn sign_in_with_device_code(
    client: &reqwest::Client,
    device: &DeviceCodeInfo,
) -> LauncherResult<MinecraftProfile> {
    let ms_token = poll_device_token(client, device).await?;
    info!("Microsoft token acquired, continuing with Xbox Live");

    let (xbox_token, _) = xbox_live_authenticate(client, &ms_token.access_token).await?;
    let (xsts_token, user_hash) = xsts_authorize(client, &xbox_token).await?;
    let mc_auth = minecraft_login(client, &xsts_token, &user_hash).await?;

    if !owns_minecraft(client, &mc_auth.access_token).await? {
        return Err(LauncherError::AuthDeclined(
            "this account does not own Minecraft".into(),
        ));
    }

    let profile = fetch_profile(client, &mc_auth.access_token).await?;
    let skin_url = profile
        .skins
        .iter()
        .find(|skin| skin.state.as_deref() == Some("ACTIVE"))
        .or_else(|| profile.skins.first())
        .map(|skin| skin.url.clone());

    info!("Signed in as {}", profile.name);
    Ok(MinecraftProfile {
        uuid: profile.id,
        username: profile.name,
        access_token: mc_auth.access_token,
        skin_url,
        refresh_token: ms_token.refresh_token,
        expires_at: Some(Utc::now() + chrono::Duration::seconds(mc_auth.expires_in as i64)),
    })
}

/// Refresh a stored profile whose access token is expired or about to be.
///
/// Exchanges the stored refresh token for a fresh Microsoft token, then
/// revalidates the Xbox Live → XSTS → Minecraft chain. A profile that does
/// not need refreshing yet is returned unchanged. The refresh token is
/// preserved across cycles unless Microsoft rotates it.
pub async fn refresh_profile(
    client: &reqwest::Client,
    profile: &MinecraftProfile,
) -> LauncherResult<MinecraftProfile> {
    if !profile.needs_refresh() {
        return Ok(profile.clone());
    }

    let refresh_token = profile.refresh_token.clone().ok_or_else(|| {
        LauncherError::AuthProtocol("no refresh token stored for this account".into())
    })?;

    let response = client
        .post(TOKEN_URL)
        .form(&[
            ("client_id", MICROSOFT_CLIENT_ID),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("scope", OAUTH_SCOPE),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(LauncherError::AuthProtocol(format!(
            "token refresh returned {}",
            status
        )));
    }

    let granted = response.json::<TokenPollResponse>().await?;
    let ms_access_token = granted.access_token.ok_or_else(|| {
        LauncherError::AuthProtocol("token refresh returned no access token".into())
    })?;

    info!("Microsoft token refreshed, revalidating the Xbox chain");
    let (xbox_token, _) = xbox_live_authenticate(client, &ms_access_token).await?;
    let (xsts_token, user_hash) = xsts_authorize(client, &xbox_token).await?;
    let mc_auth = minecraft_login(client, &xsts_token, &user_hash).await?;

    Ok(MinecraftProfile {
        access_token: mc_auth.access_token,
        refresh_token: granted.refresh_token.or_else(|| profile.refresh_token.clone()),
        expires_at: Some(Utc::now() + chrono::Duration::seconds(mc_auth.expires_in as i64)),
        ..profile.clone()
    })
}

// ── Profile persistence ─────────────────────────────────

fn account_path(data_dir: &Path) -> PathBuf {
    data_dir.join(ACCOUNT_FILE)
}

pub fn save_profile(data_dir: &Path, profile: &MinecraftProfile) -> LauncherResult<()> {
    let path = account_path(data_dir);
    let json = serde_json::to_string_pretty(profile)?;
    std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
}

pub fn load_profile(data_dir: &Path) -> LauncherResult<Option<MinecraftProfile>> {
    let path = account_path(data_dir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LauncherError::Io { path, source }),
    };
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn clear_profile(data_dir: &Path) -> LauncherResult<()> {
    let path = account_path(data_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LauncherError::Io { path, source }),
    }
}
