use dropshop::config::{ClientOptions, ENV_AUTH_TOKEN, ENV_AUTO_RECONNECT, ENV_DATABASE_URL, ENV_REQUEST_TIMEOUT_SECS};
use dropshop::error::Error;
use dropshop::Storefront;
use std::env;
use std::time::Duration;

// Environment variables are process-wide, so every case runs in this one test.
#[test]
fn test_options_and_storefront_from_env() {
    env::set_var(ENV_AUTH_TOKEN, "token-from-env");
    env::set_var(ENV_REQUEST_TIMEOUT_SECS, "12");
    env::set_var(ENV_AUTO_RECONNECT, "off");

    let options = ClientOptions::from_env().unwrap();
    assert_eq!(options.auth_token.as_deref(), Some("token-from-env"));
    assert_eq!(options.request_timeout, Some(Duration::from_secs(12)));
    assert!(!options.realtime.auto_reconnect);

    env::set_var(ENV_REQUEST_TIMEOUT_SECS, "0");
    assert_eq!(ClientOptions::from_env().unwrap().request_timeout, None);

    env::set_var(ENV_REQUEST_TIMEOUT_SECS, "soon");
    assert!(matches!(ClientOptions::from_env(), Err(Error::Config(_))));
    env::remove_var(ENV_REQUEST_TIMEOUT_SECS);

    env::remove_var(ENV_DATABASE_URL);
    assert!(matches!(Storefront::from_env(), Err(Error::Config(_))));

    env::set_var(ENV_DATABASE_URL, "https://dropshop-demo.firebaseio.com");
    let shop = Storefront::from_env().unwrap();
    assert_eq!(shop.url(), Some("https://dropshop-demo.firebaseio.com"));
    assert_eq!(shop.options().auth_token.as_deref(), Some("token-from-env"));
}
