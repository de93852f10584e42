//! Cookie jar, session cookie manager and Netscape cookie files.

mod jar;
mod manager;
mod netscape;

pub use jar::{Cookie, CookieJar, parse_set_cookie};
pub use manager::CookieManager;
pub use netscape::{
    InvalidCookieLine, NETSCAPE_HEADER, ParseResult, parse_netscape_cookies,
    write_netscape_cookies,
};
