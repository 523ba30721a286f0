//! Digest access authentication (RFC 7616, MD5 profile).
//!
//! The session lives on the client and survives across requests: once a
//! challenge was answered, every following request carries a fresh
//! `Authorization` header with an incremented nonce count. The nonce
//! count resets whenever the server hands out a new nonce.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qop {
    None,
    Auth,
}

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub stale: bool,
    algorithm: Algorithm,
    qop: Qop,
}

/// Parses a Digest challenge. Returns `None` when the scheme is not
/// Digest or the challenge demands something this engine cannot do
/// (unknown algorithm, or a qop list without `auth`).
pub fn parse_challenge(header: &str) -> Option<Challenge> {
    let rest = header.trim();
    if rest.len() < 7 || !rest[..7].eq_ignore_ascii_case("digest ") {
        return None;
    }
    let mut realm = None;
    let mut nonce = None;
    let mut opaque = None;
    let mut stale = false;
    let mut algorithm = Algorithm::Md5;
    let mut qop = Qop::None;
    for part in rest[7..].split(',') {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (
                key.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ),
            None => continue,
        };
        match key.as_str() {
            "realm" => realm = Some(value),
            "nonce" => nonce = Some(value),
            "opaque" => opaque = Some(value),
            "stale" => stale = value.eq_ignore_ascii_case("true"),
            "algorithm" => {
                algorithm = if value.eq_ignore_ascii_case("md5") {
                    Algorithm::Md5
                } else if value.eq_ignore_ascii_case("md5-sess") {
                    Algorithm::Md5Sess
                } else {
                    return None;
                }
            }
            "qop" => {
                if value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("auth"))
                {
                    qop = Qop::Auth;
                } else {
                    return None;
                }
            }
            _ => {}
        }
    }
    Some(Challenge {
        realm: realm?,
        nonce: nonce?,
        opaque,
        stale,
        algorithm,
        qop,
    })
}

fn md5_hex(data: &str) -> String {
    format!("{:x}", md5::compute(data.as_bytes()))
}

/// A 16-hex-digit client nonce, unique per process invocation.
fn make_cnonce(seq: u32) -> String {
    let mut hasher = RandomState::new().build_hasher();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_nanos().hash(&mut hasher);
    seq.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Per-(realm, nonce) authentication state.
#[derive(Debug)]
pub struct Session {
    challenge: Challenge,
    nc: u32,
}

impl Session {
    pub fn new(challenge: Challenge) -> Session {
        Session { challenge, nc: 0 }
    }

    pub fn nonce(&self) -> &str {
        &self.challenge.nonce
    }

    /// Adopts a fresh challenge. The nonce count restarts when the
    /// nonce changed (including the `stale=true` case).
    pub fn rekey(&mut self, challenge: Challenge) {
        if challenge.nonce != self.challenge.nonce {
            self.nc = 0;
        }
        self.challenge = challenge;
    }

    /// Computes the `Authorization` header value for one request,
    /// consuming one nonce count.
    pub fn authorization(
        &mut self,
        user: &str,
        password: &str,
        method: &str,
        uri: &str,
    ) -> String {
        self.nc += 1;
        let nc = format!("{:08x}", self.nc);
        let cnonce = make_cnonce(self.nc);
        let ch = &self.challenge;
        let mut ha1 = md5_hex(&format!("{}:{}:{}", user, ch.realm, password));
        if ch.algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{}:{}:{}", ha1, ch.nonce, cnonce));
        }
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let response = match ch.qop {
            Qop::Auth => md5_hex(&format!(
                "{}:{}:{}:{}:auth:{}",
                ha1, ch.nonce, nc, cnonce, ha2
            )),
            Qop::None => md5_hex(&format!("{}:{}:{}", ha1, ch.nonce, ha2)),
        };
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\"",
            user, ch.realm, ch.nonce, uri
        );
        header.push_str(match ch.algorithm {
            Algorithm::Md5 => ", algorithm=MD5",
            Algorithm::Md5Sess => ", algorithm=MD5-sess",
        });
        if ch.qop == Qop::Auth {
            header.push_str(&format!(", qop=auth, nc={}, cnonce=\"{}\"", nc, cnonce));
        }
        header.push_str(&format!(", response=\"{}\"", response));
        if let Some(opaque) = &ch.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}
