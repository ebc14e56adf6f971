// REST client for the management server.
//
// Only the device listing consumed by the topology seed lives here --
// CRUD for organizations, networks, devices, profiles, and users is the
// backend's concern and out of scope for this client.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;
use crate::wire::{DeviceCollection, DeviceRecord};

/// Authenticated client for the management server's REST surface.
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
}

impl RestClient {
    /// Build a client for `base_url`, injecting the bearer token as a
    /// default header when one is available.
    pub fn new(
        base_url: Url,
        token: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&value)
                .map_err(|e| Error::Tls(format!("invalid auth token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base: ensure_trailing_slash(base_url),
        })
    }

    /// List the adopted devices of one network.
    ///
    /// `GET /devices/list?organizationId={org}&networkId={network}`
    pub async fn list_network_devices(
        &self,
        organization_id: &str,
        network_id: &str,
    ) -> Result<Vec<DeviceRecord>, Error> {
        let mut url = self.base.join("devices/list")?;
        url.query_pairs_mut()
            .append_pair("organizationId", organization_id)
            .append_pair("networkId", network_id);

        debug!(organization_id, network_id, "listing network devices");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                message: body,
                status: status.as_u16(),
            });
        }

        let collection: DeviceCollection =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(collection.devices)
    }
}

/// `Url::join` resolves relative to the last path segment; a trailing
/// slash keeps `/api` + `devices/list` from becoming `/devices/list`.
fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_network_devices_decodes_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/list"))
            .and(query_param("organizationId", "org1"))
            .and(query_param("networkId", "net1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "devices": [
                    {
                        "id": "dev1",
                        "name": "core-sw",
                        "mac_address": "aa:bb:cc:dd:ee:ff",
                        "ip_address": "10.0.0.2",
                        "model": "RS-2400",
                        "fw_version": "3.1.4",
                        "location": "rack 2"
                    },
                    { "id": "dev2" }
                ]
            })))
            .mount(&server)
            .await;

        let client = RestClient::new(
            server.uri().parse().unwrap(),
            Some(&SecretString::from("tok".to_owned())),
            &TransportConfig::default(),
        )
        .unwrap();

        let devices = client.list_network_devices("org1", "net1").await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, "dev1");
        assert_eq!(devices[0].mac_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        // Sparse records decode with every optional field absent.
        assert!(devices[1].name.is_none());
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/devices/list"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = RestClient::new(
            server.uri().parse().unwrap(),
            None,
            &TransportConfig::default(),
        )
        .unwrap();

        let err = client.list_network_devices("org1", "net1").await.unwrap_err();
        match err {
            Error::Api { status, .. } => assert_eq!(status, 403),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn base_url_join_preserves_path_prefix() {
        let base = ensure_trailing_slash("https://rfsight.local/api".parse().unwrap());
        let joined = base.join("devices/list").unwrap();
        assert_eq!(joined.as_str(), "https://rfsight.local/api/devices/list");
    }
}
