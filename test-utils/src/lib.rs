//! Mock servers shared by the `inflight-lib` tests.
//!
//! The servers are started through macros expanding in the calling test, which
//! therefore needs `wiremock` and `http` among its own dev-dependencies.

use std::net::TcpListener;

/// Create a mock web server, which responds with a predefined status when
/// handling a matching request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::method("GET")).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Set up a mock server which has two routes: `/ok` and `/fail`.
/// `/ok` answers with `200 OK` and `/fail` with `500 Internal Server Error`,
/// both after the given delay.
#[macro_export]
macro_rules! outcome_mock_server {
    ($delay:expr) => {{
        let mock_server = wiremock::MockServer::start().await;

        let ok = wiremock::ResponseTemplate::new(http::StatusCode::OK).set_delay($delay);
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/ok"))
            .respond_with(ok)
            .mount(&mock_server)
            .await;

        let fail = wiremock::ResponseTemplate::new(http::StatusCode::INTERNAL_SERVER_ERROR)
            .set_delay($delay);
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/fail"))
            .respond_with(fail)
            .mount(&mock_server)
            .await;

        mock_server
    }};
}

/// URL of a local port nothing listens on, so connecting to it fails
///
/// # Panic
///
/// This panics if no local port can be bound, so it should only be used for
/// testing
#[must_use]
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Expected a free local port");
    let addr = listener.local_addr().expect("Expected a bound local address");
    drop(listener);
    format!("http://{addr}/")
}
