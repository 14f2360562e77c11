use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// #    userid name                uniqueid            connected ping loss state  adr
// #      2 "Sk1LL0"          [U:1:198288660]     00:42       68    0 active 1.2.3.4:27005
static STATUS_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^#\s+(\d+)\s+"(.+)"\s+(\[U:\d:\d+\])\s+[\d:]+\s+\d+\s+\d+\s+\w+\s+(\d+\.\d+\.\d+\.\d+:\d+)"#,
    )
    .expect("Invalid regex pattern for status row")
});

/// A connected player as listed by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub username: String,
    pub steam_id: String,
    pub ip: String,
}

/// Parses the player table out of `status` output.
///
/// Returns `None` when the output has no `#` header at all, which happens
/// when the server is still flushing a previous response.
pub fn parse_status(output: &str) -> Option<Vec<Player>> {
    let start = output.find('#')?;

    let players = output[start..]
        .lines()
        .filter_map(|line| STATUS_ROW.captures(line.trim_end()))
        .map(|m| Player {
            user_id: m[1].to_string(),
            username: m[2].to_string(),
            steam_id: m[3].to_string(),
            ip: m[4].to_string(),
        })
        .collect();

    Some(players)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "hostname: TF2Stadium Server
version : 3626305/24 3626305 secure
udp/ip  : 0.0.0.0:27015  (public ip: 1.2.3.4)
map     : cp_badlands at: 0 x, 0 y, 0 z
players : 2 humans, 1 bots (25 max)
# userid name                uniqueid            connected ping loss state  adr
#      2 \"Sk1LL0\"          [U:1:198288660]     00:42       68    0 active 10.0.0.5:27005
#      3 \"say \"hi\" guy\"   [U:1:64912509]   1:02:11      50    0 active 10.0.0.6:27005
#      4 \"Bot\"             BOT                                     active
";

    #[test]
    fn test_parse_status_rows() {
        let players = parse_status(STATUS).unwrap();
        assert_eq!(players.len(), 2);

        assert_eq!(
            players[0],
            Player {
                user_id: "2".to_string(),
                username: "Sk1LL0".to_string(),
                steam_id: "[U:1:198288660]".to_string(),
                ip: "10.0.0.5:27005".to_string(),
            }
        );
    }

    #[test]
    fn test_username_keeps_inner_quotes() {
        let players = parse_status(STATUS).unwrap();
        assert_eq!(players[1].username, "say \"hi\" guy");
        assert_eq!(players[1].user_id, "3");
    }

    #[test]
    fn test_header_only_is_empty() {
        let players = parse_status("# userid name uniqueid connected ping loss state adr\n");
        assert_eq!(players, Some(Vec::new()));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(parse_status("hostname: test\nmap: cp_process\n"), None);
    }
}
