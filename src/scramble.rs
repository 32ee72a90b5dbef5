// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

use std::borrow::Cow;

use sha1::Sha1;
use sha2::{Digest, Sha256};

const MYSQL_NATIVE_PASSWORD_PLUGIN_NAME: &[u8] = b"mysql_native_password";
const CACHING_SHA2_PASSWORD_PLUGIN_NAME: &[u8] = b"caching_sha2_password";

/// `AuthMoreData` payload sent by `caching_sha2_password` when the cached
/// fast path succeeded.
pub const FAST_AUTH_SUCCESS: u8 = 0x03;

/// `AuthMoreData` payload sent by `caching_sha2_password` when the server
/// requires the full authentication exchange.
pub const PERFORM_FULL_AUTHENTICATION: u8 = 0x04;

/// Authentication plugin
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum AuthPlugin<'a> {
    /// Legacy authentication plugin
    MysqlNativePassword,
    /// Default since MySql v8.0.4
    CachingSha2Password,
    Other(Cow<'a, [u8]>),
}

impl<'a> AuthPlugin<'a> {
    pub fn from_bytes(name: &'a [u8]) -> AuthPlugin<'a> {
        match name {
            CACHING_SHA2_PASSWORD_PLUGIN_NAME => AuthPlugin::CachingSha2Password,
            MYSQL_NATIVE_PASSWORD_PLUGIN_NAME => AuthPlugin::MysqlNativePassword,
            name => AuthPlugin::Other(name.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            AuthPlugin::MysqlNativePassword => MYSQL_NATIVE_PASSWORD_PLUGIN_NAME,
            AuthPlugin::CachingSha2Password => CACHING_SHA2_PASSWORD_PLUGIN_NAME,
            AuthPlugin::Other(name) => name,
        }
    }

    pub fn into_owned(self) -> AuthPlugin<'static> {
        match self {
            AuthPlugin::CachingSha2Password => AuthPlugin::CachingSha2Password,
            AuthPlugin::MysqlNativePassword => AuthPlugin::MysqlNativePassword,
            AuthPlugin::Other(name) => AuthPlugin::Other(name.into_owned().into()),
        }
    }

    /// Generates the auth response for this plugin.
    ///
    /// Returns `None` for plugins this client does not implement. An empty
    /// password produces an empty response.
    pub fn gen_data(&self, pass: &str, nonce: &[u8]) -> Option<Vec<u8>> {
        match self {
            AuthPlugin::MysqlNativePassword => Some(
                scramble_native(nonce, pass.as_bytes())
                    .map(|x| x.to_vec())
                    .unwrap_or_default(),
            ),
            AuthPlugin::CachingSha2Password => Some(
                scramble_sha256(nonce, pass.as_bytes())
                    .map(|x| x.to_vec())
                    .unwrap_or_default(),
            ),
            AuthPlugin::Other(_) => None,
        }
    }
}

/// Scramble algorithm used by the `mysql_native_password` plugin.
///
/// `SHA1(password) XOR SHA1(nonce, SHA1(SHA1(password)))`
pub fn scramble_native(nonce: &[u8], password: &[u8]) -> Option<[u8; 20]> {
    fn sha1_1(bytes: impl AsRef<[u8]>) -> [u8; 20] {
        Sha1::digest(bytes.as_ref()).into()
    }

    fn sha1_2(bytes1: impl AsRef<[u8]>, bytes2: impl AsRef<[u8]>) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(bytes1.as_ref());
        hasher.update(bytes2.as_ref());
        hasher.finalize().into()
    }

    if password.is_empty() {
        return None;
    }

    let mut output = sha1_1(password);
    let double_sha_pass = sha1_1(output);
    let hash = sha1_2(nonce, double_sha_pass);

    for i in 0..20 {
        output[i] ^= hash[i];
    }

    Some(output)
}

/// Scramble algorithm used by the `caching_sha2_password` fast path.
///
/// `SHA256(password) XOR SHA256(SHA256(SHA256(password)), nonce)`
pub fn scramble_sha256(nonce: &[u8], password: &[u8]) -> Option<[u8; 32]> {
    fn sha256_1(bytes: impl AsRef<[u8]>) -> [u8; 32] {
        Sha256::digest(bytes.as_ref()).into()
    }

    fn sha256_2(bytes1: impl AsRef<[u8]>, bytes2: impl AsRef<[u8]>) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(bytes1.as_ref());
        hasher.update(bytes2.as_ref());
        hasher.finalize().into()
    }

    if password.is_empty() {
        return None;
    }

    let mut output = sha256_1(password);
    let hash = sha256_2(sha256_1(sha256_1(password)), nonce);

    for i in 0..32 {
        output[i] ^= hash[i];
    }

    Some(output)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_compute_scrambled_password() {
        let nonce = [
            0x4e, 0x52, 0x33, 0x48, 0x50, 0x3a, 0x71, 0x49, 0x59, 0x61, 0x5f, 0x39, 0x3d, 0x64,
            0x62, 0x3f, 0x53, 0x64, 0x7b, 0x60,
        ];
        let password = [0x47, 0x21, 0x69, 0x64, 0x65, 0x72, 0x32, 0x37];
        let output1 = scramble_native(&nonce, &password).unwrap();
        let output2 = scramble_sha256(&nonce, &password).unwrap();
        assert_eq!(
            output1,
            [
                0x09, 0xcf, 0xf8, 0x85, 0x5e, 0x9e, 0x70, 0x53, 0x40, 0xff, 0x22, 0x70, 0xd8,
                0xfb, 0x9f, 0xad, 0xba, 0x90, 0x6b, 0x70,
            ]
        );
        assert_eq!(
            output2,
            [
                0x4f, 0x97, 0xbb, 0xfd, 0x20, 0x24, 0x01, 0xc4, 0x2a, 0x69, 0xde, 0xaa, 0xe5,
                0x3b, 0xda, 0x07, 0x7e, 0xd7, 0x57, 0x85, 0x63, 0xc1, 0xa8, 0x0e, 0xb8, 0x16,
                0xc8, 0x21, 0x19, 0xb6, 0x8d, 0x2e,
            ]
        );
    }

    #[test]
    fn should_produce_empty_response_for_empty_password() {
        assert_eq!(scramble_native(b"01234567890123456789", b""), None);
        assert_eq!(scramble_sha256(b"01234567890123456789", b""), None);
        assert_eq!(
            AuthPlugin::MysqlNativePassword.gen_data("", b"01234567890123456789"),
            Some(vec![])
        );
    }

    #[test]
    fn should_resolve_plugin_names() {
        assert_eq!(
            AuthPlugin::from_bytes(b"mysql_native_password"),
            AuthPlugin::MysqlNativePassword
        );
        assert_eq!(
            AuthPlugin::from_bytes(b"caching_sha2_password"),
            AuthPlugin::CachingSha2Password
        );
        assert!(matches!(
            AuthPlugin::from_bytes(b"sha256_password"),
            AuthPlugin::Other(_)
        ));
    }
}
