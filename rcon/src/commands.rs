//! Server administration helpers built on [`RconConnection::send`].

use crate::connection::RconConnection;
use crate::error::RconError;
use crate::players::{parse_status, Player};
use crate::transport::Dialer;
use log::{debug, info};

/// `status` is re-sent this many times when its output lacks a player table.
const STATUS_ATTEMPTS: usize = 5;

impl<D: Dialer> RconConnection<D> {
    pub async fn kick_player_id(&mut self, user_id: &str, reason: &str) -> Result<(), RconError> {
        self.send(&format!("kickid {} {}", user_id, reason)).await?;
        Ok(())
    }

    pub async fn kick_player(&mut self, player: &Player, reason: &str) -> Result<(), RconError> {
        self.kick_player_id(&player.user_id, reason).await
    }

    /// Bans a player by user id. An empty `reason` is omitted.
    pub async fn ban_player(
        &mut self,
        minutes: u32,
        player: &Player,
        reason: &str,
    ) -> Result<(), RconError> {
        let mut command = format!("banid {} {}", minutes, player.user_id);
        if !reason.is_empty() {
            command.push_str(&format!(" \"{}\"", reason));
        }
        self.send(&command).await?;
        Ok(())
    }

    pub async fn unban_player(&mut self, player: &Player) -> Result<(), RconError> {
        self.send(&format!("unbanid {}", player.user_id)).await?;
        Ok(())
    }

    pub async fn say(&mut self, message: &str) -> Result<(), RconError> {
        self.send(&format!("say {}", message)).await?;
        Ok(())
    }

    /// Any output from `changelevel` means the server refused the map.
    pub async fn change_map(&mut self, map: &str) -> Result<(), RconError> {
        let response = self.send(&format!("changelevel \"{}\"", map)).await?;
        let response = response.trim();
        if !response.is_empty() {
            return Err(RconError::MapChangeRejected {
                map: map.to_string(),
                response: response.to_string(),
            });
        }
        info!("Changed map to {}", map);
        Ok(())
    }

    pub async fn change_server_password(&mut self, password: &str) -> Result<(), RconError> {
        self.set_variable("sv_password", password).await?;
        Ok(())
    }

    pub async fn server_password(&mut self) -> Result<String, RconError> {
        self.get_variable("sv_password").await
    }

    /// Appends `tag` to `sv_tags` unless it is already present.
    pub async fn add_tag(&mut self, tag: &str) -> Result<(), RconError> {
        let tags = self.get_variable("sv_tags").await?;
        if tags.split(',').any(|t| t == tag) {
            return Ok(());
        }

        let updated = if tags.is_empty() {
            tag.to_string()
        } else {
            format!("{},{}", tags, tag)
        };
        self.set_variable("sv_tags", &updated).await?;
        Ok(())
    }

    pub async fn remove_tag(&mut self, tag: &str) -> Result<(), RconError> {
        let tags = self.get_variable("sv_tags").await?;
        if !tags.split(',').any(|t| t == tag) {
            return Ok(());
        }

        let remaining: Vec<&str> = tags.split(',').filter(|t| *t != tag).collect();
        self.set_variable("sv_tags", &remaining.join(",")).await?;
        Ok(())
    }

    pub async fn set_log_secret(&mut self, secret: &str) -> Result<(), RconError> {
        self.send(&format!("sv_logsecret {}", secret)).await?;
        Ok(())
    }

    /// Starts forwarding the server's log to `address` (`ip:port`).
    pub async fn redirect_logs(&mut self, address: &str) -> Result<(), RconError> {
        self.send(&format!("logaddress_add {}", address)).await?;
        Ok(())
    }

    /// Stops forwarding logs to `address`. Failures are logged, never returned.
    pub async fn stop_log_redirection(&mut self, address: &str) {
        self.send_best_effort(&format!("logaddress_del {}", address))
            .await;
    }

    /// Runs each line of `config` as a command, stopping at the first error.
    pub async fn exec_config(&mut self, config: &str) -> Result<(), RconError> {
        for line in config.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            self.send(line).await?;
        }
        Ok(())
    }

    /// Lists connected players from `status`. Bots are left out.
    pub async fn list_players(&mut self) -> Result<Vec<Player>, RconError> {
        for attempt in 1..=STATUS_ATTEMPTS {
            let output = self.send("status").await?;
            if let Some(players) = parse_status(&output) {
                return Ok(players);
            }
            debug!("status output had no player table (attempt {})", attempt);
        }

        Err(RconError::StatusUnavailable)
    }
}
