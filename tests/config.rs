use std::time::Duration;

use clap::Parser;
use callcache::config::Config;

#[test]
fn defaults() {
    let config = Config::parse_from(["callcache"]);
    assert_eq!(config.port, 9100);
    assert_eq!(config.rpc_url, "http://localhost:8545");
    assert_eq!(config.poll_interval, 2000);
    assert_eq!(config.request_timeout, 10);
    assert_eq!(config.idle_capacity, 10000);
    assert_eq!(config.idle_ttl, 300);
    assert!(config.watch.is_empty());
    assert!(!config.verbose);
}

#[test]
fn cli_overrides() {
    let config = Config::parse_from([
        "callcache",
        "--port",
        "8080",
        "--rpc-url",
        "http://node:8545",
        "--poll-interval",
        "500",
        "--request-timeout",
        "3",
        "--idle-capacity",
        "50",
        "--idle-ttl",
        "30",
        "--watch",
        "0xtoken:totalSupply()",
        "--watch",
        "0xtoken:balanceOf(address):0x00000000000000000000000000000000000000aa",
        "--verbose",
    ]);
    assert_eq!(config.port, 8080);
    assert_eq!(config.rpc_url, "http://node:8545");
    assert_eq!(config.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.request_timeout(), Duration::from_secs(3));
    assert_eq!(
        config.watch,
        vec![
            "0xtoken:totalSupply()",
            "0xtoken:balanceOf(address):0x00000000000000000000000000000000000000aa",
        ]
    );
    assert!(config.verbose);

    let cache = config.cache_config();
    assert_eq!(cache.idle_capacity, 50);
    assert_eq!(cache.idle_ttl, Duration::from_secs(30));
}
