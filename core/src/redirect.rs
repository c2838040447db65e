//! Redirect handling for read requests.
//!
//! Some environments forbid the HTTP backend from following redirects on its
//! own. The strategy is chosen once, at construction, from
//! `Capabilities::native_redirects`. Under `Manual`, `follow` walks the chain
//! with HEAD probes before the real request is sent to the final URL.

use tracing::debug;
use url::Url;

use crate::config::Capabilities;
use crate::transport::HeadProber;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStrategy {
    /// The backend follows redirects itself.
    Native,
    /// Probe and follow at most `max_redirects` 301/302 hops by hand.
    Manual { max_redirects: u32 },
}

impl RedirectStrategy {
    pub fn select(capabilities: &Capabilities, max_redirects: u32) -> Self {
        if capabilities.native_redirects {
            RedirectStrategy::Native
        } else {
            RedirectStrategy::Manual { max_redirects }
        }
    }
}

/// Final URL after following at most `max_redirects` hops from `start`.
///
/// Stops early on a probe failure, on any status other than 301/302, or on a
/// redirect whose `Location` is missing or empty. Running out of budget is not
/// an error; the last URL reached is returned.
pub fn follow(prober: &dyn HeadProber, start: &str, max_redirects: u32) -> String {
    let mut current = start.to_string();
    let mut remaining = max_redirects;

    while remaining > 0 {
        let head = match prober.head(&current) {
            Ok(head) => head,
            Err(error) => {
                debug!(url = %current, %error, "redirect probe failed");
                break;
            }
        };
        if !matches!(head.status, 301 | 302) {
            break;
        }
        let Some(next) = head.header("Location").and_then(|location| resolve(&current, location)) else {
            debug!(url = %current, status = head.status, "redirect without usable location");
            break;
        };
        debug!(from = %current, to = %next, status = head.status, "following redirect");
        current = next;
        remaining -= 1;
    }
    current
}

fn resolve(current: &str, location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    match Url::parse(current) {
        Ok(base) => base.join(location).ok().map(String::from),
        Err(_) => Some(location.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::http::HeadResponse;

    /// Canned HEAD responses keyed by URL; unknown URLs answer 200.
    struct ChainProber {
        responses: HashMap<String, HeadResponse>,
        probed: Mutex<Vec<String>>,
    }

    impl ChainProber {
        fn new(chain: &[(&str, u16, Option<&str>)]) -> Self {
            let responses = chain
                .iter()
                .map(|(url, status, location)| {
                    let headers = location
                        .map(|l| vec![("location".to_string(), l.to_string())])
                        .unwrap_or_default();
                    (url.to_string(), HeadResponse { status: *status, headers })
                })
                .collect();
            Self {
                responses,
                probed: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }
    }

    impl HeadProber for ChainProber {
        fn head(&self, url: &str) -> Result<HeadResponse, String> {
            self.probed.lock().unwrap().push(url.to_string());
            Ok(self.responses.get(url).cloned().unwrap_or(HeadResponse {
                status: 200,
                headers: Vec::new(),
            }))
        }
    }

    fn chain() -> ChainProber {
        ChainProber::new(&[
            ("http://a.test/x", 301, Some("http://b.test/x")),
            ("http://b.test/x", 302, Some("http://c.test/x")),
        ])
    }

    #[test]
    fn follows_chain_within_budget() {
        let prober = chain();
        assert_eq!(follow(&prober, "http://a.test/x", 2), "http://c.test/x");
        assert_eq!(prober.probed(), vec!["http://a.test/x", "http://b.test/x"]);
    }

    #[test]
    fn stops_at_first_non_redirect() {
        let prober = chain();
        assert_eq!(follow(&prober, "http://a.test/x", 5), "http://c.test/x");
        assert_eq!(prober.probed().len(), 3);
    }

    #[test]
    fn exhausted_budget_stops_without_error() {
        let prober = chain();
        assert_eq!(follow(&prober, "http://a.test/x", 1), "http://b.test/x");
    }

    #[test]
    fn zero_budget_never_probes() {
        let prober = chain();
        assert_eq!(follow(&prober, "http://a.test/x", 0), "http://a.test/x");
        assert!(prober.probed().is_empty());
    }

    #[test]
    fn missing_location_terminates() {
        let prober = ChainProber::new(&[("http://a.test/x", 302, None)]);
        assert_eq!(follow(&prober, "http://a.test/x", 10), "http://a.test/x");
        assert_eq!(prober.probed().len(), 1);

        let prober = ChainProber::new(&[("http://a.test/x", 301, Some("   "))]);
        assert_eq!(follow(&prober, "http://a.test/x", 10), "http://a.test/x");
    }

    #[test]
    fn relative_location_is_resolved() {
        let prober = ChainProber::new(&[("http://a.test/rest/parts/", 301, Some("/rest/v2/parts/"))]);
        assert_eq!(follow(&prober, "http://a.test/rest/parts/", 1), "http://a.test/rest/v2/parts/");
    }

    #[test]
    fn other_redirect_codes_are_not_followed() {
        let prober = ChainProber::new(&[("http://a.test/x", 307, Some("http://b.test/x"))]);
        assert_eq!(follow(&prober, "http://a.test/x", 3), "http://a.test/x");
    }

    #[test]
    fn strategy_follows_capability() {
        assert_eq!(RedirectStrategy::select(&Capabilities::default(), 1), RedirectStrategy::Native);
        assert_eq!(
            RedirectStrategy::select(&Capabilities::sandboxed(), 3),
            RedirectStrategy::Manual { max_redirects: 3 }
        );
    }
}
