//! SMART outbound security module (`SECURITY_OUT_SMART`)
//!
//! The authorization server: HTTP listener, OIDC issuer, login skin,
//! sessions, TLS, and the modules it depends on.

use super::module::{ModuleReconciler, ModuleType};
use declarative::{AttributeSpec, Check, ListJoin, Schema};
use smilecdr::Client;

pub const KIND: &str = "smart_outbound_security";
pub const MODULE_TYPE: &str = "SECURITY_OUT_SMART";

const SECRET_ENCODINGS: &[&str] = &[
    "SHA256_1000_ROUND",
    "SHA256_10000_ROUND",
    "SHA256_100000_ROUND",
    "PBKDF2_256_1000_RND",
    "PBKDF2_256_10000_RND",
    "PBKDF2_256_100000_RND",
    "BCRYPT_10_ROUND",
    "BCRYPT_12_ROUND",
    "BCRYPT_14_ROUND",
    "BCRYPT_16_ROUND",
];

const SPECS: &[AttributeSpec] = &[
    AttributeSpec::string("node_id").default_str("Master").immutable(),
    AttributeSpec::string("module_id")
        .required()
        .immutable()
        .check(Check::NoWhitespace),
    // user authentication
    AttributeSpec::string("anonymous_account_username")
        .option("anonymous.access.account_username")
        .default_str("ANONYMOUS"),
    AttributeSpec::boolean("anonymous_access_enabled")
        .option("anonymous.access.enabled")
        .default_bool(false),
    AttributeSpec::boolean("saml_authentication_enabled")
        .option("saml.enabled")
        .default_bool(false),
    // cors
    AttributeSpec::string("cors_allowed_headers").option("cors.allowed_headers"),
    AttributeSpec::boolean("cors_enabled").option("cors.enable").default_bool(false),
    AttributeSpec::string("cors_origins").option("cors.origins").default_str("*"),
    AttributeSpec::boolean("davinci_native_consent_handling").option("davinci.consent_handling"),
    // http listener
    AttributeSpec::list("http_access_log_appenders").option("access_log.appenders"),
    AttributeSpec::string("http_listener_bind_address")
        .option("bind_address")
        .default_str("0.0.0.0"),
    AttributeSpec::string("http_listener_context_path")
        .option("context_path")
        .default_str("/"),
    AttributeSpec::string("http_listener_endpoint_health_path")
        .option("endpoint_health.path")
        .default_str("/endpoint-health"),
    AttributeSpec::integer("http_listener_unhealthy_response_code")
        .option("endpoint_health.status_code_if_unhealthy")
        .default_int(503)
        .check(Check::Range(100, 599)),
    AttributeSpec::boolean("http_listener_https_forwarding_assumed")
        .option("https_forwarding_assumed")
        .default_bool(false),
    AttributeSpec::integer("http_listener_port")
        .option("port")
        .required()
        .check(Check::Range(1, 65535)),
    AttributeSpec::boolean("http_listener_respect_forward_headers")
        .option("respect_forward_headers")
        .default_bool(false),
    // http request pool
    AttributeSpec::integer("http_request_maximum_request_header_size")
        .option("max_header_size.request.kb")
        .default_int(8),
    AttributeSpec::integer("http_request_maximum_response_header_size")
        .option("max_header_size.response.kb")
        .default_int(8),
    AttributeSpec::integer("http_request_read_idle_timeout")
        .option("read_idle_timeout.millis")
        .default_int(30000),
    AttributeSpec::integer("http_request_thread_pool_accept_queue_size").option("thread_pool.accept_queue_size"),
    AttributeSpec::integer("http_request_thread_pool_max_size")
        .option("threadpool.max")
        .default_int(10),
    AttributeSpec::integer("http_request_thread_pool_min_size")
        .option("threadpool.min")
        .default_int(5),
    // http security
    AttributeSpec::boolean("http_security_block_http_head")
        .option("block_http_head")
        .default_bool(false),
    AttributeSpec::boolean("http_security_block_http_options")
        .option("block_http_options")
        .default_bool(false),
    AttributeSpec::list("http_security_custom_response_headers").option("custom_response_headers"),
    AttributeSpec::string("http_security_frame_options_allow_from").option("frame_options.allow_from"),
    AttributeSpec::string("http_security_pin_host").option("pin_host"),
    AttributeSpec::boolean("http_security_suppress_error_details")
        .option("suppress_error_details")
        .default_bool(false),
    AttributeSpec::boolean("http_security_suppress_platform_info")
        .option("suppress_platform_info")
        .default_bool(false),
    // javascript debugging
    AttributeSpec::boolean("javascript_debug_enabled")
        .option("debug.debug_enabled")
        .default_bool(false),
    AttributeSpec::string("javascript_debug_host_address")
        .option("debug.host_address")
        .default_str("localhost"),
    AttributeSpec::string("javascript_debug_path").option("debug.path"),
    AttributeSpec::integer("javascript_debug_port")
        .option("debug.port")
        .default_int(9930)
        .check(Check::Range(1, 65535)),
    AttributeSpec::boolean("javascript_debug_secure")
        .option("debug.secure")
        .default_bool(false),
    AttributeSpec::boolean("javascript_debug_suspend")
        .option("debug.suspend")
        .default_bool(true),
    // jwks and token validation
    AttributeSpec::string("jwks_keystore_id").option("openid.signing.keystore_id"),
    AttributeSpec::integer("oidc_http_client_jwks_cache_timeout")
        .option("introspection_client.jwks_cache.mins")
        .default_int(30),
    AttributeSpec::string("oidc_http_client_truststore_file").option("introspection_client.truststore.file"),
    AttributeSpec::string("oidc_http_client_truststore_password")
        .option("introspection_client.truststore.password")
        .sensitive(),
    // openid connect
    AttributeSpec::boolean("oidc_pkce_required")
        .option("pkce.required")
        .default_bool(false),
    AttributeSpec::boolean("oidc_pkce_plain_challenge_supported")
        .option("pkce.plain_challenge_supported")
        .default_bool(true),
    AttributeSpec::integer("oidc_cache_authorization_tokens")
        .option("cache.authorized_tokens.millis")
        .default_int(3000),
    AttributeSpec::string("oidc_client_secret_encoding")
        .option("client_secret.encoding")
        .default_str("BCRYPT_12_ROUND")
        .check(Check::OneOf(SECRET_ENCODINGS)),
    AttributeSpec::integer("oidc_client_secret_expiry_duration")
        .option("client_secret.expiry_duration_days")
        .default_int(365),
    AttributeSpec::string("oidc_issuer_url")
        .option("issuer.url")
        .required()
        .check(Check::Url),
    AttributeSpec::boolean("oidc_rotate_token_after_use")
        .option("rotate_refresh_token_after_use")
        .default_bool(false),
    AttributeSpec::list("oidc_smart_capabilities_list").option("smart_capabilities_list"),
    AttributeSpec::boolean("oidc_federate_mode_enabled")
        .option("federate_mode.enabled")
        .default_bool(false),
    // callback scripts
    AttributeSpec::string("smart_callback_post_authorize_script_file").option("post_authorize_script.file"),
    AttributeSpec::string("smart_callback_post_authorize_script_text").option("post_authorize_script.text"),
    AttributeSpec::string("codap_authorization_script_file").option("codap.auth_script.file"),
    AttributeSpec::string("codap_authorization_script_text").option("codap.auth_script.text"),
    AttributeSpec::boolean("codap_enabled").option("codap.enabled").default_bool(false),
    // login skin
    AttributeSpec::string("smart_login_skin_approval_template").option("skin.approve_page.template"),
    AttributeSpec::string("smart_login_skin_context_selection_template").option("skin.context_selection.template"),
    AttributeSpec::string("smart_login_skin_error_template").option("skin.error_page.template"),
    AttributeSpec::string("smart_login_skin_user_registration_forgot_password_template_step1")
        .option("skin.forgot_password_step1.template"),
    AttributeSpec::string("smart_login_skin_user_registration_forgot_password_template_step2")
        .option("skin.forgot_password_step2.template"),
    AttributeSpec::string("smart_login_skin_user_registration_forgot_password_template_step3")
        .option("skin.forgot_password_step3.template"),
    AttributeSpec::string("smart_login_skin_federated_oath2_template").option("skin.login_oauth2_page.template"),
    AttributeSpec::string("smart_login_skin_login_template").option("skin.login_page.template"),
    AttributeSpec::string("smart_login_skin_user_registration_template_step1").option("skin.register_step1.template"),
    AttributeSpec::string("smart_login_skin_user_registration_template_step2").option("skin.register_step2.template"),
    AttributeSpec::string("smart_login_skin_session_management_template")
        .option("skin.session_management_page.template"),
    AttributeSpec::string("smart_login_skin_2fa_template").option("skin.tfa_page.template"),
    AttributeSpec::string("smart_login_skin_terms_of_service_template").option("skin.tos_page.template"),
    AttributeSpec::string("smart_login_skin_webjar_id").option("skin.webjar_id"),
    AttributeSpec::string("smart_login_terms_of_service").option("tos.version_string"),
    // smart authorization
    AttributeSpec::string("smart_authorization_allowed_audience_list").option("allowed_audience_list"),
    AttributeSpec::string("smart_authorization_email_from_address")
        .option("email.from_address")
        .default_str("noreply@unknown.com"),
    AttributeSpec::boolean("smart_authorization_enforce_approved_scopes")
        .option("enforce_approved_scopes_to_restrict_permissions")
        .required(),
    AttributeSpec::list("smart_authorization_scopes_supported")
        .option("smart_configuration.scopes_supported")
        .join(ListJoin::Space)
        .required(),
    // seeding
    AttributeSpec::string("openid_connect_client_pre_seed_file").option("seed_clients.file"),
    AttributeSpec::string("openid_connect_server_pre_seed_file").option("seed_servers.file"),
    // sessions
    AttributeSpec::boolean("sessions_in_memory")
        .option("sessions.inmemory")
        .default_bool(false),
    AttributeSpec::integer("sessions_max_concurrent_sessions_per_user")
        .option("sessions.maximum_concurrent")
        .default_int(0),
    AttributeSpec::integer("sessions_scavenger_interval_ms")
        .option("sessions.scavenger.interval.millis")
        .default_int(60000),
    AttributeSpec::integer("sessions_timeout_mins")
        .option("sessions.timeout.mins")
        .default_int(30),
    // tls
    AttributeSpec::boolean("tls_client_auth_enabled")
        .option("tls.clientauth.enabled")
        .default_bool(false),
    AttributeSpec::boolean("tls_enabled").option("tls.enabled").default_bool(false),
    AttributeSpec::string("tls_keystore_filename").option("tls.keystore.file"),
    AttributeSpec::string("tls_keystore_key_alias").option("tls.keystore.keyalias"),
    AttributeSpec::string("tls_keystore_key_password")
        .option("tls.keystore.keypass")
        .sensitive(),
    AttributeSpec::string("tls_keystore_password")
        .option("tls.keystore.password")
        .sensitive(),
    AttributeSpec::string("tls_cipher_allow_list").option("tls.protocol.cipher_whitelist"),
    AttributeSpec::string("tls_cipher_deny_list").option("tls.protocol.cipher_blacklist"),
    AttributeSpec::string("tls_protocol_allow_list").option("tls.protocol.protocol_whitelist"),
    AttributeSpec::string("tls_protocol_deny_list").option("tls.protocol.protocol_blacklist"),
    AttributeSpec::string("tls_truststore_filename").option("tls.truststore.file"),
    AttributeSpec::string("tls_truststore_password")
        .option("tls.truststore.password")
        .sensitive(),
    // dependencies, valued by target module id
    AttributeSpec::string("dependency_local_inbound_security")
        .dependency("SECURITY_IN_UP")
        .default_str("local_security"),
    AttributeSpec::string("dependency_fhir_persistence_module")
        .dependency("PERSISTENCE_ALL")
        .default_str("persistence"),
    AttributeSpec::string("dependency_saml_authentication_module").dependency("SECURITY_IN_SAML"),
    AttributeSpec::string("dependency_self_service_user_management_module").dependency("SELF_SERVICE_USER_MGMT"),
];

pub const SCHEMA: Schema = Schema::new(KIND, SPECS);

pub fn reconciler(client: Client) -> ModuleReconciler {
    ModuleReconciler::new(SCHEMA, ModuleType::Fixed(MODULE_TYPE), client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{Attributes, Reconciler, Value};
    use smilecdr::{Method, MockTransport};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn desired(extra: &[(&str, Value)]) -> Attributes {
        let mut raw: BTreeMap<String, Value> = BTreeMap::from([
            ("module_id".to_string(), Value::from("smart_auth")),
            ("http_listener_port".to_string(), Value::Int(9200)),
            ("oidc_issuer_url".to_string(), Value::from("https://cdr.example.com:9200")),
            ("smart_authorization_enforce_approved_scopes".to_string(), Value::Bool(true)),
            ("smart_authorization_scopes_supported".to_string(), Value::from("openid")),
        ]);
        raw.extend(extra.iter().map(|(k, v)| ((*k).to_string(), v.clone())));
        SCHEMA.bind(raw).unwrap()
    }

    fn setup() -> (MockTransport, ModuleReconciler) {
        let mock = MockTransport::new();
        (mock.clone(), reconciler(Client::new(Arc::new(mock))))
    }

    #[test]
    fn test_required_attributes() {
        let err = SCHEMA.bind(BTreeMap::from([("module_id".to_string(), Value::from("x"))]));
        assert!(err.is_err());
    }

    #[test]
    fn test_defaults_and_checks() {
        let attrs = desired(&[("oidc_client_secret_encoding", "MD5".into())]);
        assert_eq!(attrs.str("anonymous_account_username"), Some("ANONYMOUS"));
        assert_eq!(attrs.bool("javascript_debug_suspend"), Some(true));
        let diags = SCHEMA.validate(&attrs);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("oidc_client_secret_encoding"));
    }

    #[test]
    fn test_create_writes_dependencies() {
        let (mock, reconciler) = setup();
        let attrs = desired(&[("dependency_saml_authentication_module", "saml_in".into())]);
        reconciler.create(&attrs).unwrap();

        let stored = mock.entity("/module-config/Master/smart_auth").unwrap();
        assert_eq!(stored["moduleType"], MODULE_TYPE);
        assert_eq!(
            stored["dependencies"],
            serde_json::json!([
                {"moduleId": "local_security", "type": "SECURITY_IN_UP"},
                {"moduleId": "persistence", "type": "PERSISTENCE_ALL"},
                {"moduleId": "saml_in", "type": "SECURITY_IN_SAML"},
            ])
        );
        let options = stored["options"].as_array().unwrap();
        assert!(options.iter().any(|o| o["key"] == "issuer.url"));
        assert!(options.iter().any(|o| o["key"] == "port" && o["value"] == "9200"));
    }

    #[test]
    fn test_secret_survives_refresh() {
        let (mock, reconciler) = setup();
        let attrs = desired(&[("tls_keystore_password", "changeit".into())]);
        let state = reconciler.create(&attrs).unwrap();

        let mut stored = mock.entity("/module-config/Master/smart_auth").unwrap();
        for option in stored["options"].as_array_mut().unwrap() {
            if option["key"] == "tls.keystore.password" {
                option["value"] = "******".into();
            }
        }
        mock.insert("/module-config/Master/smart_auth", stored);

        let refreshed = reconciler.read(&state).unwrap().unwrap();
        assert_eq!(refreshed.str("tls_keystore_password"), Some("changeit"));
        assert_eq!(refreshed.list("smart_authorization_scopes_supported"), Some(&["openid".to_string()][..]));
    }

    #[test]
    fn test_destroy_is_hard_delete() {
        let (mock, reconciler) = setup();
        let state = reconciler.create(&desired(&[])).unwrap();
        reconciler.destroy(&state).unwrap();
        assert_eq!(mock.calls_with(Method::Delete).len(), 1);
        assert!(mock.calls_with(Method::Put).is_empty());
    }
}
