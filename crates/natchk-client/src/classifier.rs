//! The classification decision tree (SPEC_FULL.md §4.2).

use crate::probe::{
    CheckFullConeProbe, CheckRestrictedConeProbe, FullConeOutcome, GetAddrOutcome, GetAddrProbe,
    RestrictedConeOutcome,
};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use natchk_core::endpoint::Endpoint;
use natchk_core::iface;
use natchk_core::server_list::ServerList;
use natchk_core::verdict::Verdict;
use natchk_transport::Transport;
use tracing::{info, warn};

/// Run one full classification against `servers` using `transport`, and
/// shut the transport down before returning.
pub async fn classify(transport: Transport, servers: &ServerList) -> Verdict {
    let verdict = classify_inner(&transport, servers).await;
    info!(%verdict, "classification complete");
    transport.shutdown().await;
    verdict
}

async fn classify_inner(transport: &Transport, servers: &ServerList) -> Verdict {
    // Step 1: discover how the primary server sees us.
    let observed = match GetAddrProbe::spawn(transport.clone(), servers.primary())
        .await
        .unwrap_or(GetAddrOutcome::Exhausted)
    {
        GetAddrOutcome::Observed(ep) => ep,
        GetAddrOutcome::Exhausted => {
            warn!("GetAddr against primary server exhausted its retries");
            return Verdict::Unknown;
        }
    };

    // Step 2: are we directly reachable at that address?
    let interfaces = match iface::enumerate_interfaces() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            warn!(error = %e, "failed to enumerate local interfaces");
            Vec::new()
        }
    };
    if iface::is_local_address(&interfaces, observed.ip()) {
        return Verdict::Public;
    }

    // Step 3: the full-cone and symmetric tests both need an alternate server.
    let alternate = match servers.alternate() {
        Some(ep) => ep,
        None => {
            warn!("fewer than two servers configured; cannot distinguish NAT type beyond PUBLIC");
            return Verdict::Unknown;
        }
    };

    // Step 4: full-cone test.
    let full_cone = CheckFullConeProbe::spawn(transport.clone(), servers.primary(), alternate)
        .await
        .unwrap_or(FullConeOutcome::Exhausted);
    if full_cone == FullConeOutcome::Confirmed {
        return Verdict::FullCone;
    }

    // Step 5: symmetric test — GetAddr against every server, concurrently.
    if is_symmetric(transport, servers).await {
        return Verdict::Symmetric;
    }

    // Step 6: restricted-cone vs. port-restricted-cone.
    match CheckRestrictedConeProbe::spawn(transport.clone(), servers.primary(), alternate)
        .await
        .unwrap_or(RestrictedConeOutcome::PortRestricted)
    {
        RestrictedConeOutcome::Restricted => Verdict::RestrictedCone,
        RestrictedConeOutcome::PortRestricted => Verdict::PortRestrictedCone,
    }
}

async fn is_symmetric(transport: &Transport, servers: &ServerList) -> bool {
    let mut pending: FuturesUnordered<_> = servers
        .iter()
        .map(|server| GetAddrProbe::spawn(transport.clone(), *server))
        .collect();

    let mut observations: Vec<Endpoint> = Vec::new();
    while let Some(result) = pending.next().await {
        if let Ok(GetAddrOutcome::Observed(ep)) = result {
            // Incremental check: two observations sharing an IP but
            // differing in port already prove a symmetric mapping.
            if observations
                .iter()
                .any(|seen| seen.ip() == ep.ip() && seen.port() != ep.port())
            {
                return true;
            }
            observations.push(ep);
        }
    }

    // Final check: more than one distinct IP observed also proves symmetric.
    let distinct_ips = observations
        .iter()
        .map(|e| e.ip())
        .collect::<std::collections::HashSet<_>>();
    distinct_ips.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_rule_same_ip_different_port() {
        let obs = vec![
            Endpoint::new("203.0.113.7:51001".parse().unwrap()),
            Endpoint::new("203.0.113.7:51002".parse().unwrap()),
        ];
        let distinct_ips = obs
            .iter()
            .map(|e| e.ip())
            .collect::<std::collections::HashSet<_>>();
        assert_eq!(distinct_ips.len(), 1);
        assert!(obs[0].port() != obs[1].port());
    }

    #[test]
    fn symmetric_rule_multiple_ips() {
        let obs = vec![
            Endpoint::new("203.0.113.7:51001".parse().unwrap()),
            Endpoint::new("203.0.113.8:51001".parse().unwrap()),
        ];
        let distinct_ips = obs
            .iter()
            .map(|e| e.ip())
            .collect::<std::collections::HashSet<_>>();
        assert!(distinct_ips.len() > 1);
    }
}
