use std::io::IsTerminal;
use std::sync::Arc;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linkcast_stream::{DataStream, StreamKind};
use serde::Serialize;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct StreamRow {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    target: String,
    status: String,
}

impl StreamRow {
    fn from_stream(stream: &DataStream) -> Self {
        Self {
            id: stream.id().to_string(),
            kind: stream.kind().name(),
            target: kind_target(stream.kind()),
            status: stream.status().to_string(),
        }
    }
}

/// Print the configured streams in the selected format.
pub fn print_streams(streams: &[Arc<DataStream>], format: OutputFormat) {
    let rows: Vec<StreamRow> = streams
        .iter()
        .map(|stream| StreamRow::from_stream(stream))
        .collect();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "TYPE", "TARGET", "STATUS"]);
            for row in &rows {
                table.add_row(vec![
                    row.id.clone(),
                    row.kind.to_string(),
                    row.target.clone(),
                    row.status.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in &rows {
                println!(
                    "id={} type={} target={} status={}",
                    row.id, row.kind, row.target, row.status
                );
            }
        }
    }
}

fn kind_target(kind: &StreamKind) -> String {
    match kind {
        StreamKind::Tcp { server, port } => format!("{server}:{port}"),
        StreamKind::Bluetooth { addr, channel } => format!("{addr} channel {channel}"),
        StreamKind::Serial { device, baud } => format!("{device} @ {baud}"),
        StreamKind::Feed => "local".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_row_carries_target_and_status() {
        let stream = DataStream::from_descriptor("A:tcp:127.0.0.1:9999").unwrap();
        let row = StreamRow::from_stream(&stream);
        assert_eq!(row.id, "A");
        assert_eq!(row.kind, "tcp");
        assert_eq!(row.target, "127.0.0.1:9999");
        assert_eq!(row.status, "unknown");
    }

    #[test]
    fn serial_and_bt_targets_are_readable() {
        let serial = DataStream::from_descriptor("R:xbee:/dev/ttyUSB0:57600").unwrap();
        assert_eq!(kind_target(serial.kind()), "/dev/ttyUSB0 @ 57600");

        let bt = DataStream::from_descriptor("B:bt:00:0A:95:9D:68:16:1").unwrap();
        assert_eq!(kind_target(bt.kind()), "00:0A:95:9D:68:16 channel 1");
    }
}
