//! Shared test helper macro for attaching perimeter principal headers.
//! Usage: test_principal_headers!(req, user="U1", roles="ROLE_USER");
#[macro_export]
macro_rules! test_principal_headers {
    ($req:expr, user=$user:expr, roles=$roles:expr) => {{
        let h = $req.headers_mut();
        h.insert($crate::USER_ID_HEADER, ::axum::http::HeaderValue::from_str($user).unwrap());
        h.insert($crate::ROLES_HEADER, ::axum::http::HeaderValue::from_str($roles).unwrap());
    }};
    ($req:expr, user=$user:expr) => {{
        let h = $req.headers_mut();
        h.insert($crate::USER_ID_HEADER, ::axum::http::HeaderValue::from_str($user).unwrap());
    }};
}
