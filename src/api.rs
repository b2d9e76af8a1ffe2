// API client module: one async reqwest client that talks to every
// collaborator of a mint run (key backend, Pinata, mint backend, Crossmint
// status, OpenSea refresh). Each call maps its failures onto the matching
// `MintError` kind so the workflow can tell the steps apart.

use anyhow::{anyhow, Context};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{MintError, Result};

/// Short-lived Pinata key issued by the backend for a single run.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadCredential {
    pub bearer_token: String,
    pub credential_id: String,
}

impl fmt::Debug for UploadCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCredential")
            .field("bearer_token", &"<redacted>")
            .field("credential_id", &self.credential_id)
            .finish()
    }
}

/// Response of `GET /api/key`.
#[derive(Deserialize, Debug)]
struct KeyResponse {
    #[serde(rename = "JWT")]
    jwt: Option<String>,
    pinata_api_key: Option<String>,
}

/// Response of both Pinata pinning endpoints.
#[derive(Deserialize, Debug)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

/// The ERC-721 style metadata document pinned for the token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
    pub external_url: String,
}

#[derive(Serialize, Debug)]
struct MintRequest<'a> {
    address: &'a str,
    uri: &'a str,
}

#[derive(Deserialize, Debug)]
struct MintResponse {
    id: Option<String>,
}

/// Handle of an asynchronous mint on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintJob {
    pub job_id: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnChainStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct OnChainInfo {
    pub status: Option<OnChainStatus>,
    pub token_id: Option<String>,
}

/// Body of the Crossmint NFT status endpoint; only `onChain` matters here.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MintStatusResponse {
    pub on_chain: Option<OnChainInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub on_chain_status: OnChainStatus,
    pub token_id: String,
}

impl MintStatusResponse {
    /// `Some` only once the chain reports success and a token id is set.
    pub fn minted(&self) -> Option<MintResult> {
        let on_chain = self.on_chain.as_ref()?;
        match (on_chain.status, on_chain.token_id.as_deref()) {
            (Some(OnChainStatus::Success), Some(token_id)) if !token_id.is_empty() => {
                Some(MintResult {
                    on_chain_status: OnChainStatus::Success,
                    token_id: token_id.to_string(),
                })
            }
            _ => None,
        }
    }

    pub fn status(&self) -> Option<OnChainStatus> {
        self.on_chain.as_ref().and_then(|c| c.status)
    }
}

#[derive(Serialize, Debug)]
struct RevokeRequest<'a> {
    #[serde(rename = "apiKey")]
    api_key: &'a str,
}

/// Async client holding the shared reqwest client and every base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    backend_url: String,
    pinata_api_url: String,
    crossmint_api_url: String,
    crossmint_collection_id: String,
    crossmint_client_secret: String,
    crossmint_project_id: String,
    opensea_api_url: String,
    opensea_api_key: Option<String>,
    chain: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiClient {
            client,
            backend_url: trim(&config.backend_url),
            pinata_api_url: trim(&config.pinata_api_url),
            crossmint_api_url: trim(&config.crossmint_api_url),
            crossmint_collection_id: config.crossmint_collection_id.clone(),
            crossmint_client_secret: config.crossmint_client_secret.clone(),
            crossmint_project_id: config.crossmint_project_id.clone(),
            opensea_api_url: trim(&config.opensea_api_url),
            opensea_api_key: config.opensea_api_key.clone(),
            chain: config.chain.clone(),
        })
    }

    fn key_url(&self) -> String {
        format!("{}/api/key", self.backend_url)
    }

    /// Ask the backend for a fresh upload key.
    pub async fn fetch_credential(&self) -> Result<UploadCredential> {
        let res = self
            .client
            .get(self.key_url())
            .send()
            .await
            .map_err(|e| MintError::Credential(e.to_string()))?;
        if !res.status().is_success() {
            return Err(MintError::Credential(failure_detail(res).await));
        }
        let body: KeyResponse = res
            .json()
            .await
            .map_err(|e| MintError::Credential(format!("unreadable key response: {}", e)))?;

        let bearer_token = non_empty(body.jwt)
            .ok_or_else(|| MintError::Credential("response has no JWT".into()))?;
        let credential_id = non_empty(body.pinata_api_key)
            .ok_or_else(|| MintError::Credential("response has no pinata_api_key".into()))?;
        debug!(credential_id = %credential_id, "upload credential issued");
        Ok(UploadCredential {
            bearer_token,
            credential_id,
        })
    }

    /// Pin the user's file and return its content identifier.
    pub async fn upload_file(
        &self,
        file_name: &str,
        file_bytes: &[u8],
        credential: &UploadCredential,
    ) -> Result<String> {
        let url = format!("{}/pinning/pinFileToIPFS", self.pinata_api_url);

        let part = multipart::Part::bytes(file_bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(&mime_for(file_name))
            .map_err(|e| MintError::Upload(e.to_string()))?;
        let pinata_metadata = serde_json::json!({ "name": file_name }).to_string();
        let pinata_options = serde_json::json!({ "cidVersion": 0 }).to_string();
        let form = multipart::Form::new()
            .part("file", part)
            .text("pinataMetadata", pinata_metadata)
            .text("pinataOptions", pinata_options);

        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, bearer(credential))
            .multipart(form)
            .send()
            .await
            .map_err(|e| MintError::Upload(e.to_string()))?;
        pinned_cid(res).await.map_err(MintError::Upload)
    }

    /// Pin the metadata document and return its content identifier.
    pub async fn publish_metadata(
        &self,
        metadata: &TokenMetadata,
        credential: &UploadCredential,
    ) -> Result<String> {
        let url = format!("{}/pinning/pinJSONToIPFS", self.pinata_api_url);
        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, bearer(credential))
            .json(metadata)
            .send()
            .await
            .map_err(|e| MintError::MetadataPublish(e.to_string()))?;
        pinned_cid(res).await.map_err(MintError::MetadataPublish)
    }

    /// Ask the backend to mint `uri` to `wallet`. Returns as soon as the
    /// job is queued; confirmation comes from polling.
    pub async fn request_mint(&self, wallet: &str, uri: &str) -> Result<MintJob> {
        let url = format!("{}/api/mint", self.backend_url);
        let res = self
            .client
            .post(&url)
            .json(&MintRequest {
                address: wallet,
                uri,
            })
            .send()
            .await
            .map_err(|e| MintError::MintRequest(e.to_string()))?;
        if !res.status().is_success() {
            return Err(MintError::MintRequest(failure_detail(res).await));
        }
        let body: MintResponse = res
            .json()
            .await
            .map_err(|e| MintError::MintRequest(format!("unreadable mint response: {}", e)))?;
        let job_id = non_empty(body.id)
            .ok_or_else(|| MintError::MintRequest("response has no job id".into()))?;
        Ok(MintJob { job_id })
    }

    /// One status check of a mint job.
    pub async fn mint_status(&self, job: &MintJob) -> Result<MintStatusResponse> {
        let url = format!(
            "{}/collections/{}/nfts/{}",
            self.crossmint_api_url, self.crossmint_collection_id, job.job_id
        );
        let res = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .header("x-client-secret", &self.crossmint_client_secret)
            .header("x-project-id", &self.crossmint_project_id)
            .send()
            .await
            .context("Failed to send mint status request")?;
        if !res.status().is_success() {
            return Err(anyhow!("mint status failed: {}", failure_detail(res).await).into());
        }
        let body = res
            .json()
            .await
            .context("Parsing mint status response json")?;
        Ok(body)
    }

    /// Ask the marketplace to re-index a token. Best effort: failures are
    /// logged and never reach the caller.
    pub async fn refresh_metadata(&self, contract: &str, token_id: &str) {
        match self.try_refresh(contract, token_id).await {
            Ok(()) => info!(contract, token_id, "marketplace metadata refresh requested"),
            Err(e) => warn!(contract, token_id, "Failed to refresh marketplace metadata: {:#}", e),
        }
    }

    async fn try_refresh(&self, contract: &str, token_id: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/chain/{}/contract/{}/nfts/{}/refresh",
            self.opensea_api_url, self.chain, contract, token_id
        );
        let mut req = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.opensea_api_key {
            req = req.header("X-API-KEY", key);
        }
        let res = req.send().await.context("Failed to send refresh request")?;
        if !res.status().is_success() {
            anyhow::bail!("refresh rejected: {}", failure_detail(res).await);
        }
        Ok(())
    }

    /// Invalidate the upload key handed out for this run.
    pub async fn revoke_credential(&self, credential: &UploadCredential) -> Result<()> {
        self.revoke_credential_id(&credential.credential_id).await
    }

    /// Invalidate an upload key by id alone.
    pub async fn revoke_credential_id(&self, credential_id: &str) -> Result<()> {
        let revoke_err = |reason: String| MintError::Revoke {
            credential_id: credential_id.to_string(),
            reason,
        };
        let res = self
            .client
            .put(self.key_url())
            .json(&RevokeRequest {
                api_key: credential_id,
            })
            .send()
            .await
            .map_err(|e| revoke_err(e.to_string()))?;
        if !res.status().is_success() {
            return Err(revoke_err(failure_detail(res).await));
        }
        debug!(credential_id, "upload credential revoked");
        Ok(())
    }
}

fn trim(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn bearer(credential: &UploadCredential) -> String {
    format!("Bearer {}", credential.bearer_token)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// "<status> - <body>" for a rejected request.
async fn failure_detail(res: Response) -> String {
    let status = res.status();
    let txt = res.text().await.unwrap_or_default();
    format!("{} - {}", status, txt)
}

/// Shared tail of both pinning calls.
async fn pinned_cid(res: Response) -> std::result::Result<String, String> {
    if !res.status().is_success() {
        return Err(failure_detail(res).await);
    }
    let body: PinResponse = res
        .json()
        .await
        .map_err(|e| format!("unreadable pin response: {}", e))?;
    non_empty(body.ipfs_hash).ok_or_else(|| "response has no IpfsHash".to_string())
}

/// MIME type for the uploaded part, guessed from the file extension.
pub fn mime_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::Server) -> ApiClient {
        let config = AppConfig {
            backend_url: server.url(),
            pinata_api_url: server.url(),
            crossmint_api_url: server.url(),
            crossmint_collection_id: "col".into(),
            crossmint_client_secret: "secret".into(),
            crossmint_project_id: "proj".into(),
            opensea_api_url: server.url(),
            ..AppConfig::default()
        };
        ApiClient::new(&config).unwrap()
    }

    fn credential() -> UploadCredential {
        UploadCredential {
            bearer_token: "jwt-1".into(),
            credential_id: "key-1".into(),
        }
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for("jersey.PNG"), "image/png");
        assert_eq!(mime_for("a.b.jpeg"), "image/jpeg");
        assert_eq!(mime_for("jersey.bmp"), "image/bmp");
        assert_eq!(mime_for("clip.webm"), "video/webm");
        assert_eq!(mime_for("track.ogg"), "audio/ogg");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn debug_hides_bearer_token() {
        let shown = format!("{:?}", credential());
        assert!(!shown.contains("jwt-1"));
        assert!(shown.contains("key-1"));
    }

    #[test]
    fn minted_requires_success_and_token() {
        let parse = |raw: &str| serde_json::from_str::<MintStatusResponse>(raw).unwrap();

        assert!(parse(r#"{"onChain":{"status":"pending"}}"#).minted().is_none());
        assert!(parse(r#"{"onChain":{"status":"success","tokenId":""}}"#)
            .minted()
            .is_none());
        assert!(parse(r#"{"onChain":{"status":"failed","tokenId":"7"}}"#)
            .minted()
            .is_none());
        assert!(parse(r#"{}"#).minted().is_none());

        let done = parse(r#"{"id":"job","onChain":{"status":"success","tokenId":"42"}}"#);
        assert_eq!(
            done.minted(),
            Some(MintResult {
                on_chain_status: OnChainStatus::Success,
                token_id: "42".into()
            })
        );
    }

    #[tokio::test]
    async fn fetch_credential_reads_jwt_and_key_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"JWT":"jwt-1","pinata_api_key":"key-1"}"#)
            .create_async()
            .await;

        let cred = client_for(&server).fetch_credential().await.unwrap();
        assert_eq!(cred, credential());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_credential_without_jwt_is_a_credential_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/key")
            .with_status(200)
            .with_body(r#"{"pinata_api_key":"key-1"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_credential().await.unwrap_err();
        assert!(matches!(err, MintError::Credential(_)));
    }

    #[tokio::test]
    async fn upload_sends_bearer_and_multipart_parts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .match_header("authorization", "Bearer jwt-1")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="pinataOptions""#.into()),
                Matcher::Regex(r#"\{"cidVersion":0\}"#.into()),
                Matcher::Regex(r#"\{"name":"jersey.png"\}"#.into()),
                Matcher::Regex(r#"filename="jersey.png""#.into()),
            ]))
            .with_status(200)
            .with_body(r#"{"IpfsHash":"Qm1"}"#)
            .create_async()
            .await;

        let cid = client_for(&server)
            .upload_file("jersey.png", b"png-bytes", &credential())
            .await
            .unwrap();
        assert_eq!(cid, "Qm1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_part_carries_guessed_content_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .match_body(Matcher::Regex("(?i)content-type: image/bmp".into()))
            .with_status(200)
            .with_body(r#"{"IpfsHash":"QmBmp"}"#)
            .create_async()
            .await;

        let cid = client_for(&server)
            .upload_file("jersey.bmp", b"bmp-bytes", &credential())
            .await
            .unwrap();
        assert_eq!(cid, "QmBmp");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upload_without_hash_is_an_upload_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/pinning/pinFileToIPFS")
            .with_status(200)
            .with_body(r#"{"error":"quota"}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .upload_file("jersey.png", b"png-bytes", &credential())
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::Upload(_)));
    }

    #[tokio::test]
    async fn rejected_metadata_is_a_publish_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/pinning/pinJSONToIPFS")
            .with_status(401)
            .with_body("unauthorized")
            .create_async()
            .await;

        let metadata = TokenMetadata {
            name: "Test".into(),
            description: "Desc".into(),
            image: "https://gw/ipfs/Qm1".into(),
            external_url: "https://example.com".into(),
        };
        let err = client_for(&server)
            .publish_metadata(&metadata, &credential())
            .await
            .unwrap_err();
        match err {
            MintError::MetadataPublish(detail) => assert!(detail.contains("401")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn mint_status_sends_crossmint_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/collections/col/nfts/job123")
            .match_header("x-client-secret", "secret")
            .match_header("x-project-id", "proj")
            .with_status(200)
            .with_body(r#"{"onChain":{"status":"pending"}}"#)
            .create_async()
            .await;

        let status = client_for(&server)
            .mint_status(&MintJob {
                job_id: "job123".into(),
            })
            .await
            .unwrap();
        assert_eq!(status.status(), Some(OnChainStatus::Pending));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_swallows_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chain/base/contract/0xabc/nfts/42/refresh")
            .with_status(500)
            .create_async()
            .await;

        client_for(&server).refresh_metadata("0xabc", "42").await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn revoke_puts_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/key")
            .match_body(Matcher::Json(serde_json::json!({ "apiKey": "key-1" })))
            .with_status(200)
            .create_async()
            .await;

        client_for(&server)
            .revoke_credential(&credential())
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
