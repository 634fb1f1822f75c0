//! Integration tests for oneroll-remote
//!
//! Uses wiremock to simulate the broker and a WebDAV server and verifies
//! end-to-end behavior of enrollment, listing, upload and download.


mod test_broker;
mod test_webdav;
