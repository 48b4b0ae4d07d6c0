use serde::Deserialize;

/// Envelope every `/api2/json` response is wrapped in
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Payload; `null` or absent when the request was rejected
    pub data: Option<T>,
}

/// Response to `POST /access/ticket`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthTicket {
    /// Session ticket, sent back as the `PVEAuthCookie` cookie
    pub ticket: Option<String>,
    /// Anti-forgery token, sent back as the `CSRFPreventionToken` header
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_prevention_token: Option<String>,
}

/// Spice proxy session descriptor from `POST .../spiceproxy`.
///
/// Every field is required; the server includes all of them and a partial
/// record would produce an unusable viewer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpiceProxy {
    #[serde(rename = "secure-attention")]
    pub secure_attention: String,
    #[serde(rename = "delete-this-file")]
    pub delete_this_file: i64,
    pub proxy: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub ca: String,
    #[serde(rename = "toggle-fullscreen")]
    pub toggle_fullscreen: String,
    pub title: String,
    pub host: String,
    pub password: String,
    #[serde(rename = "host-subject")]
    pub host_subject: String,
    #[serde(rename = "release-cursor")]
    pub release_cursor: String,
    #[serde(rename = "tls-port")]
    pub tls_port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_with_missing_csrf() {
        let env: Envelope<AuthTicket> =
            serde_json::from_str(r#"{"data":{"ticket":"PVE:root@pam:AAAA"}}"#).unwrap();
        let ticket = env.data.unwrap();
        assert_eq!(ticket.ticket.as_deref(), Some("PVE:root@pam:AAAA"));
        assert!(ticket.csrf_prevention_token.is_none());
    }

    #[test]
    fn test_rejected_login_has_null_data() {
        let env: Envelope<AuthTicket> = serde_json::from_str(r#"{"data":null}"#).unwrap();
        assert!(env.data.is_none());

        let env: Envelope<AuthTicket> = serde_json::from_str("{}").unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn test_spice_proxy_requires_every_field() {
        let partial = r#"{"type":"spice","host":"pvespiceproxy:abc","tls-port":61000}"#;
        assert!(serde_json::from_str::<SpiceProxy>(partial).is_err());
    }

    #[test]
    fn test_tls_port_outside_port_range_is_rejected() {
        let body = r#"{
            "secure-attention":"Ctrl+Alt+Ins","delete-this-file":1,
            "proxy":"http://10.0.0.5:3128","type":"spice","ca":"",
            "toggle-fullscreen":"Shift+F11","title":"VM 105","host":"h",
            "password":"p","host-subject":"CN=pve1","release-cursor":"Ctrl+Alt+R",
            "tls-port":70000
        }"#;
        let err = serde_json::from_str::<SpiceProxy>(body).unwrap_err();
        assert!(err.to_string().contains("70000"));

        let body = body.replace("70000", "61000");
        assert_eq!(serde_json::from_str::<SpiceProxy>(&body).unwrap().tls_port, 61000);
    }
}
