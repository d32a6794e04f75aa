#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Mutex;

use rstest::rstest;
use tempfile::TempDir;
use video_quality::{
    ClipDescriptor, ConfigError, EncoderPair, HarnessError, LayerConfig, MetricRecord,
    MetricValue, ResultSet, RunConfig, ToolLocator,
};

// Writing an executable while another test forks can fail exec with ETXTBSY.
static SERIAL: Mutex<()> = Mutex::new(());

const QCIF_FRAME: usize = 176 * 144 * 3 / 2;

const VPXENC: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do
  case "$arg" in
    --output=*) out="${arg#--output=}" ;;
  esac
done
printf '%01250d' 0 > "$out"
"#;

const VPXENC_FAILING_AT_1200: &str = r#"#!/bin/sh
out=""
for arg in "$@"; do
  case "$arg" in
    --output=*) out="${arg#--output=}" ;;
    --target-bitrate=1200) echo "rate control exploded" >&2; exit 1 ;;
  esac
done
printf '%01250d' 0 > "$out"
"#;

const SVC_ENCODER: &str = r#"#!/bin/sh
prefix="$2"
for layer in 0 1 2; do
  printf '%0500d' 0 > "${prefix}_${layer}.ivf"
done
"#;

const VPXDEC: &str = r#"#!/bin/sh
prev=""
out=""
stats=""
for arg in "$@"; do
  case "$arg" in
    --framestats=*) stats="${arg#--framestats=}" ;;
  esac
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
: > "$out"
printf 'bytes,qp\n700,30\n550,32\n' > "$stats"
"#;

const TINY_SSIM: &str = r#"#!/bin/sh
printf 'psnr,ssim\n35.5,0.95\n36.0,0.96\n' > "$5"
echo "AvgPSNR: 35.75"
echo "GlbPSNR: 35.70"
echo "SSIM: 0.955"
echo "VpxSSIM: 80.1"
echo "Nframes: 2"
"#;

// Base layer of a 3-layer encode is measured with skip=3; report no frames for it.
const TINY_SSIM_EMPTY_BASE_LAYER: &str = r#"#!/bin/sh
printf 'psnr,ssim\n35.5,0.95\n36.0,0.96\n' > "$5"
echo "AvgPSNR: 35.75"
echo "SSIM: 0.955"
if [ "$4" = "3" ]; then echo "Nframes: 0"; else echo "Nframes: 2"; fi
"#;

const RUN_VMAF: &str = r#"#!/bin/sh
echo '{"aggregate": {"VMAF_score": 91.5}, "frames": [{"VMAF_score": 90.0}, {"VMAF_score": 93.0}]}'
"#;

const RUN_VMAF_FAILING: &str = r#"#!/bin/sh
echo "model file missing" >&2
exit 2
"#;

const H264ENC: &str = r#"#!/bin/sh
prev=""
out=""
for arg in "$@"; do
  if [ "$prev" = "-bf" ]; then out="$arg"; fi
  prev="$arg"
done
printf '%01250d' 0 > "$out"
"#;

const H264DEC: &str = r#"#!/bin/sh
: > "$2"
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(vpxenc: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = Self { dir };
        for (tool, script) in [
            ("libvpx/vpxenc", vpxenc),
            ("libvpx/examples/vpx_temporal_svc_encoder", SVC_ENCODER),
            ("libvpx/vpxdec", VPXDEC),
            ("libvpx/tools/tiny_ssim", TINY_SSIM),
            ("openh264/h264enc", H264ENC),
            ("openh264/h264dec", H264DEC),
        ] {
            fixture.install(tool, script);
        }
        fs::create_dir_all(fixture.path("clips")).expect("clip dir");
        fs::create_dir_all(fixture.path("scratch")).expect("scratch dir");
        fixture
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn install(&self, tool: &str, script: &str) {
        let path = self.path("tools").join(tool);
        fs::create_dir_all(path.parent().expect("tool parent")).expect("tool dir");
        fs::write(&path, script).expect("write stub");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
    }

    fn clip(&self, name: &str) -> ClipDescriptor {
        let path = self.path("clips").join(name);
        fs::write(&path, vec![128u8; 2 * QCIF_FRAME]).expect("write clip");
        ClipDescriptor::parse(&format!("{}:30", path.display())).expect("clip descriptor")
    }

    fn results(&self) -> ResultSet {
        ResultSet::read(&self.path("results.json")).expect("result document")
    }

    fn scratch_is_empty(&self) -> bool {
        fs::read_dir(self.path("scratch"))
            .expect("list scratch")
            .next()
            .is_none()
    }

    fn config(&self, clips: Vec<ClipDescriptor>, encoders: &str, workers: usize) -> RunConfig {
        let mut config = RunConfig::new(
            clips,
            EncoderPair::parse_list(encoders).expect("encoder list"),
            ToolLocator::new(self.path("tools"), false),
        );
        config.workers = workers;
        config.output = Some(self.path("results.json"));
        config.scratch_root = Some(self.path("scratch"));
        config
    }
}

fn without_timing(records: &[MetricRecord]) -> Vec<String> {
    let mut lines = records
        .iter()
        .map(|record| {
            let mut record = record.clone();
            record.remove("actual-encode-time-ms");
            record.remove("encode-time-utilization");
            serde_json::to_string(&record).expect("serialize")
        })
        .collect::<Vec<_>>();
    lines.sort();
    lines
}

#[test]
fn two_clips_two_pairs_yield_one_record_per_job() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let clips = vec![fx.clip("foreman_176_144.yuv"), fx.clip("akiyo_176_144.yuv")];
    let config = fx.config(clips, "libvpx-rt:vp8,openh264:h264", 4);

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.total_jobs, 24);
    assert_eq!(report.failed_jobs, 0);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.records, 24);
    assert!(fx.scratch_is_empty());

    let on_disk = fx.results();
    assert_eq!(on_disk.len(), 24);
    let text = fs::read_to_string(fx.path("results.json")).expect("read results");
    assert!(text.starts_with("[\n"));
    assert!(text.ends_with("]\n"));

    let vp8 = on_disk
        .iter()
        .find(|r| r.as_str("codec") == Some("vp8") && r.as_i64("target-bitrate-bps") == Some(400_000))
        .expect("vp8 record at 400 kbps");
    assert_eq!(vp8.as_str("layer-pattern"), Some("1sl1tl"));
    assert_eq!(vp8.as_i64("frame-count"), Some(2));
    assert_eq!(vp8.as_int_list("frame-bytes"), Some(&[700, 550][..]));
    assert_eq!(vp8.as_f64("ssim"), Some(0.955));
    // 1250 bytes * 8 * 30 fps / 2 frames
    assert_eq!(vp8.as_f64("actual-bitrate-bps"), Some(150_000.0));
    assert_eq!(vp8.as_f64("bitrate-utilization"), Some(150_000.0 / 400_000.0));
    assert_eq!(vp8.as_i64("input-total-frames"), Some(2));
    assert_eq!(
        vp8.as_str("input-file-sha256sum").map(str::len),
        Some(64)
    );

    let h264 = on_disk
        .iter()
        .find(|r| r.as_str("codec") == Some("h264"))
        .expect("h264 record");
    assert!(!h264.contains("frame-bytes"));
    assert!(h264.contains("frame-psnr"));
}

#[test]
fn failing_encode_drops_only_that_job() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC_FAILING_AT_1200);
    let config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8,openh264:h264", 3);

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.total_jobs, 12);
    assert_eq!(report.failed_jobs, 1);
    assert_ne!(report.exit_code(), 0);
    assert_eq!(report.records, 11);
    assert!(fx.scratch_is_empty());

    let results = fx.results();
    assert_eq!(results.len(), 11);
    assert!(results.iter().all(|r| {
        !(r.as_str("codec") == Some("vp8") && r.as_i64("target-bitrate-bps") == Some(1_200_000))
    }));
    assert!(
        results
            .iter()
            .any(|r| r.as_str("codec") == Some("h264") && r.as_i64("target-bitrate-bps") == Some(1_200_000))
    );
}

#[rstest]
#[case(2)]
#[case(4)]
fn pool_size_does_not_change_the_result_set(#[case] workers: usize) {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let clips = vec![fx.clip("foreman_176_144.yuv")];

    video_quality::run(&fx.config(clips.clone(), "libvpx-rt:vp8,openh264:h264", 1))
        .expect("serial run");
    let serial = fx.results();
    video_quality::run(&fx.config(clips, "libvpx-rt:vp8,openh264:h264", workers))
        .expect("parallel run");
    let parallel = fx.results();
    assert_eq!(serial.len(), 12);
    assert_eq!(
        without_timing(serial.records()),
        without_timing(parallel.records())
    );
}

#[test]
fn three_temporal_layers_yield_three_records_per_job() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.layers = LayerConfig::new(1, 3).expect("layers");

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.total_jobs, 6);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.records, 18);

    let results = fx.results();
    let base = results
        .iter()
        .find(|r| {
            r.as_int_list("bitrate-config-kbps") == Some(&[360, 520, 800][..])
                && r.as_i64("temporal-layer") == Some(0)
        })
        .expect("base layer of the 800 kbps job");
    assert_eq!(base.as_i64("target-bitrate-bps"), Some(360_000));
    assert_eq!(base.as_f64("layer-fps"), Some(7.5));
    assert_eq!(base.as_str("layer-pattern"), Some("1sl3tl"));
}

#[test]
fn encoded_files_can_be_kept() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let keep = fx.path("encoded");
    fs::create_dir_all(&keep).expect("encoded dir");
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.encoded_file_dir = Some(keep.clone());

    video_quality::run(&config).expect("run");
    let kept = fs::read_dir(&keep).expect("list encoded").count();
    assert_eq!(kept, 6);
    assert!(keep.join("foreman_176_144-libvpx-rt-vp8-1sl1tl-800-sl0-tl0.webm").is_file());
}

#[test]
fn dump_commands_runs_nothing() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.dump_commands = true;

    let report = video_quality::run(&config).expect("dry run");
    assert!(report.dry_run);
    assert_eq!(report.total_jobs, 6);
    assert_eq!(report.exit_code(), 0);
    assert!(!fx.path("results.json").exists());
}

#[test]
fn missing_decoder_aborts_before_scheduling() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    fs::remove_file(fx.path("tools/openh264/h264dec")).expect("remove decoder");
    let config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "openh264:h264", 2);

    let err = video_quality::run(&config).expect_err("missing tool");
    assert!(matches!(
        err,
        HarnessError::Config(ConfigError::MissingTool { .. })
    ));
    assert!(!fx.path("results.json").exists());
}

#[test]
fn unsupported_combination_is_a_config_error() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "openh264:h264", 2);
    config.layers = LayerConfig::new(1, 2).expect("layers");

    assert!(matches!(
        video_quality::run(&config),
        Err(HarnessError::Config(ConfigError::UnsupportedLayers { .. }))
    ));
}

#[test]
fn unmeasurable_layer_keeps_sibling_layers() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    fx.install("libvpx/tools/tiny_ssim", TINY_SSIM_EMPTY_BASE_LAYER);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.layers = LayerConfig::new(1, 3).expect("layers");

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.total_jobs, 6);
    assert_eq!(report.failed_jobs, 6);
    assert_ne!(report.exit_code(), 0);
    assert_eq!(report.records, 12);
    assert!(fx.scratch_is_empty());

    let results = fx.results();
    assert_eq!(results.len(), 12);
    assert!(results.iter().all(|r| r.as_i64("temporal-layer") != Some(0)));
    let upper = results
        .iter()
        .filter(|r| r.as_int_list("bitrate-config-kbps") == Some(&[360, 520, 800][..]))
        .filter_map(|r| r.as_i64("temporal-layer"))
        .collect::<Vec<_>>();
    assert_eq!(upper.len(), 2);
    assert!(upper.contains(&1) && upper.contains(&2));
}

#[test]
fn vmaf_scores_are_merged_into_each_record() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    fx.install("vmaf/run_vmaf", RUN_VMAF);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.enable_vmaf = true;

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.exit_code(), 0);
    let results = fx.results();
    assert_eq!(results.len(), 6);
    for record in &results {
        assert_eq!(record.as_f64("vmaf"), Some(91.5));
        assert_eq!(
            record.get("frame-vmaf"),
            Some(&MetricValue::FloatList(vec![90.0, 93.0]))
        );
    }
}

#[test]
fn failing_vmaf_only_omits_its_fields() {
    let _serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let fx = Fixture::new(VPXENC);
    fx.install("vmaf/run_vmaf", RUN_VMAF_FAILING);
    let mut config = fx.config(vec![fx.clip("foreman_176_144.yuv")], "libvpx-rt:vp8", 2);
    config.enable_vmaf = true;

    let report = video_quality::run(&config).expect("run");
    assert_eq!(report.failed_jobs, 0);
    assert_eq!(report.exit_code(), 0);
    let results = fx.results();
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| !r.contains("vmaf") && !r.contains("frame-vmaf")));
    assert!(results.iter().all(|r| r.contains("ssim")));
}
