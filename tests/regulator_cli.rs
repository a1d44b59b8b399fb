//! Runs `RegulatorCli` against stand-in shell scripts.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harp_updater::{CliGateway, Device, Error, GatewayConfig, RegulatorCli};

const FAKE_REGULATOR: &str = r#"#!/bin/sh
case "$1" in
  list)
    case "$*" in
      *--allow-connect*) fw="0.3.0" ;;
      *) fw="0.2.0" ;;
    esac
    printf '[{"Confidence":"High","Kind":"Pico","State":"Online","PortName":"COM5","FirmwareVersion":"%s"}, "junk"]\n' "$fw"
    ;;
  upload)
    case "$*" in
      *--force*) echo "Uploaded $2 to $4" ;;
      *) echo "Device identity mismatch" >&2; exit 3 ;;
    esac
    ;;
  *)
    exit 64
    ;;
esac
"#;

const BROKEN_REGULATOR: &str = "#!/bin/sh\necho 'driver crashed' >&2\nexit 2\n";

const HANGING_REGULATOR: &str = "#!/bin/sh\nsleep 5\n";

const SLOW_REGULATOR: &str = "#!/bin/sh\nsleep 1\necho \"Upload complete\"\n";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn cli(path: &Path) -> RegulatorCli {
    RegulatorCli::new(GatewayConfig::new().with_cli_path(path)).unwrap()
}

// One test so no script is still open for writing while another test spawns.
#[tokio::test]
async fn talks_to_the_external_tool() {
    let dir = tempfile::tempdir().unwrap();
    let fake = write_script(dir.path(), "fake-regulator", FAKE_REGULATOR);
    let broken = write_script(dir.path(), "broken-regulator", BROKEN_REGULATOR);
    let hanging = write_script(dir.path(), "hanging-regulator", HANGING_REGULATOR);
    let slow = write_script(dir.path(), "slow-regulator", SLOW_REGULATOR);

    let regulator = cli(&fake);

    // listing: non-object entries are dropped, connect flag reaches the tool
    let records = regulator.list_devices(true, false).await.unwrap();
    assert_eq!(records.len(), 1);
    let device = Device::from_record(&records[0]).unwrap();
    assert_eq!(device.port_name, "COM5");
    assert_eq!(device.firmware_version.as_deref(), Some("0.2.0"));

    let records = regulator.list_devices(true, true).await.unwrap();
    let device = Device::from_record(&records[0]).unwrap();
    assert_eq!(device.firmware_version.as_deref(), Some("0.3.0"));

    // tool-reported failure is a report, not an error
    let firmware = dir.path().join("fw.uf2");
    let report = regulator
        .upload_firmware(&firmware, "COM5", false, true, true)
        .await
        .unwrap();
    assert!(!report.success);
    assert_eq!(report.output, "Device identity mismatch");

    let report = regulator
        .upload_firmware(&firmware, "PICOBOOT", true, true, true)
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(
        report.output,
        format!("Uploaded {} to PICOBOOT", firmware.display())
    );

    // failing listing aborts the refresh
    match cli(&broken).list_devices(true, true).await {
        Err(Error::ToolInvocation(message)) => assert!(message.contains("driver crashed")),
        other => panic!("unexpected listing result: {:?}", other),
    }

    let report = cli(&broken)
        .upload_firmware(&firmware, "COM5", false, true, true)
        .await
        .unwrap();
    assert!(!report.success);
    assert_eq!(report.output, "driver crashed");

    // hung tool is cut off by the timeout
    let hung = RegulatorCli::new(
        GatewayConfig::new()
            .with_cli_path(&hanging)
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    assert!(matches!(
        hung.list_devices(true, true).await,
        Err(Error::ToolInvocation(_))
    ));

    // a flash outlasting the listing timeout is left to finish
    let slow_flash = RegulatorCli::new(
        GatewayConfig::new()
            .with_cli_path(&slow)
            .with_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    let report = slow_flash
        .upload_firmware(&firmware, "COM5", false, true, true)
        .await
        .unwrap();
    assert!(report.success);
    assert_eq!(report.output, "Upload complete");

    // unless an upload timeout is configured
    let capped = RegulatorCli::new(
        GatewayConfig::new()
            .with_cli_path(&slow)
            .with_upload_timeout(Duration::from_millis(200)),
    )
    .unwrap();
    assert!(matches!(
        capped
            .upload_firmware(&firmware, "COM5", false, true, true)
            .await,
        Err(Error::ToolInvocation(_))
    ));
}
