use std::time::Duration;

use clap::Args;
use odboot_core::{ChunkedUploader, MAX_TRANSFER_SIZE, SequencerConfig};

mod boot;
mod detect;
mod upload;

pub use boot::{BootArgs, run_boot};
pub use detect::{DetectArgs, run_detect, run_list_boards};
pub use upload::{UploadArgs, run_upload};

/// Timing knobs shared by every command that drives a device.
#[derive(Args, Clone, Debug)]
pub struct SequencerArgs {
    /// Give up after this many scans once the booted device disconnects (default: wait forever).
    #[arg(long, value_name = "N")]
    pub reconnect_attempts: Option<u32>,
    /// Seconds to wait after starting the kernel before looking for the device again.
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub reconnect_grace: u64,
    /// Number of CPU info polls while the stage-1 loader initializes.
    #[arg(long, value_name = "N", default_value_t = 100)]
    pub ready_attempts: u32,
    /// Bulk transfer timeout in milliseconds (0 waits forever).
    #[arg(long, value_name = "MS", default_value_t = 0)]
    pub bulk_timeout: u64,
}

impl SequencerArgs {
    pub(crate) fn config(&self) -> SequencerConfig {
        SequencerConfig {
            reconnect_attempts: self.reconnect_attempts,
            reconnect_grace: Duration::from_secs(self.reconnect_grace),
            ready_poll_attempts: self.ready_attempts,
            uploader: ChunkedUploader::new(
                MAX_TRANSFER_SIZE,
                Duration::from_millis(self.bulk_timeout),
            ),
            ..SequencerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        sequencer: SequencerArgs,
    }

    #[test]
    fn defaults_match_the_protocol_timings() {
        let harness = Harness::try_parse_from(["odboot"]).unwrap();
        let config = harness.sequencer.config();
        let defaults = SequencerConfig::default();
        assert_eq!(config.reconnect_grace, defaults.reconnect_grace);
        assert_eq!(config.ready_poll_attempts, defaults.ready_poll_attempts);
        assert_eq!(config.reconnect_attempts, None);
        assert_eq!(config.uploader.chunk_size(), MAX_TRANSFER_SIZE);
    }

    #[test]
    fn overrides_flow_into_the_config() {
        let harness = Harness::try_parse_from([
            "odboot",
            "--reconnect-attempts",
            "30",
            "--reconnect-grace",
            "2",
        ])
        .unwrap();
        let config = harness.sequencer.config();
        assert_eq!(config.reconnect_attempts, Some(30));
        assert_eq!(config.reconnect_grace, Duration::from_secs(2));
    }
}
