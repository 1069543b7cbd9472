//! lumen-probe - HEVC 码流探测工具
//!
//! 读取 Annex B 格式的 H.265 码流, 统计 NAL 单元, 以仅解析后端跑完整个
//! 解码会话, 按显示顺序列出每一帧的 POC 与 slice 信息.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::process;

use lumen::logging::{self, LoggingConfig};
use lumen_core::LumenError;
use lumen_hevc::parsers::h265::{HevcNalUnitType, split_hevc_annex_b};
use lumen_hevc::{DecoderConfig, HevcDecoder, NullBackend};

/// 每次送入解码会话的字节数
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Lumen HEVC 码流探测工具
#[derive(Parser, Debug)]
#[command(name = "lumen-probe", version, about = "纯 Rust HEVC 码流探测工具")]
struct Cli {
    /// 输入文件路径 (Annex B 格式 .h265/.hevc)
    input: Option<String>,

    /// 输出 JSON 格式
    #[arg(long)]
    json: bool,

    /// DPB 容量 (1-16, 默认读取 LUMEN_HEVC_DPB_SIZE 或 16)
    #[arg(long)]
    dpb_size: Option<usize>,

    /// 日志详细程度 (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// 静默模式 (只输出探测结果)
    #[arg(short, long)]
    quiet: bool,

    /// 同时写入日志文件的目录
    #[arg(long)]
    log_dir: Option<String>,
}

// ============================================================
// 输出结构体
// ============================================================

/// 完整探测结果
#[derive(Serialize, Debug)]
struct ProbeOutput {
    filename: String,
    total_bytes: usize,
    nal_units: Vec<NalCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence: Option<SequenceInfo>,
    pictures: Vec<PictureInfo>,
}

/// 各类型 NAL 单元数量
#[derive(Serialize, Debug, PartialEq, Eq)]
struct NalCount {
    nal_type: u8,
    name: &'static str,
    count: usize,
}

/// 后端创建参数
#[derive(Serialize, Debug)]
struct SequenceInfo {
    profile: &'static str,
    level_idc: u8,
    width: u32,
    height: u32,
    /// conformance window 裁剪后的尺寸
    display_width: u32,
    display_height: u32,
    chroma_format: String,
}

/// 输出图像
#[derive(Serialize, Debug)]
struct PictureInfo {
    decode_index: u64,
    poc: i32,
    nal_type: &'static str,
    slices: usize,
    bytes: usize,
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();

    let Some(input_path) = cli.input.clone() else {
        print_banner();
        return;
    };

    if let Err(e) = init_logging(&cli) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if !cli.quiet {
        eprintln!(
            "lumen-probe 版本 {} -- 纯 Rust HEVC 码流探测工具",
            lumen::version()
        );
        eprintln!("输入文件: {input_path}");
    }

    let data = match std::fs::read(&input_path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("错误: 无法打开文件 '{input_path}': {e}");
            process::exit(1);
        }
    };

    let config = match cli.dpb_size {
        Some(size) => DecoderConfig::from_env().with_dpb_max_size(size),
        None => DecoderConfig::from_env(),
    };

    let output = match probe(&input_path, &data, config) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("错误: 解析失败: {e:#}");
            process::exit(1);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("错误: JSON 序列化失败: {e}");
                process::exit(1);
            }
        }
    } else {
        print_nal_text(&output);
        if let Some(ref sequence) = output.sequence {
            print_sequence_text(sequence);
        }
        print_pictures_text(&output.pictures);
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    match &cli.log_dir {
        Some(directory) => logging::init(LoggingConfig {
            level: level.to_string(),
            directory: directory.clone(),
            file_prefix: "lumen-probe".to_string(),
            retention_days: 30,
            compress_history: true,
        }),
        None => logging::init_console(level),
    }
}

/// 统计 NAL 单元并以仅解析后端解码整个码流
fn probe(filename: &str, data: &[u8], config: DecoderConfig) -> Result<ProbeOutput> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for nal in split_hevc_annex_b(data) {
        *counts.entry(nal.nal_type().type_id()).or_default() += 1;
    }
    let nal_units = counts
        .into_iter()
        .map(|(nal_type, count)| NalCount {
            nal_type,
            name: HevcNalUnitType::from_type_id(nal_type).name(),
            count,
        })
        .collect();

    let mut decoder = HevcDecoder::new(NullBackend::new(), config);
    debug!("DPB 容量: {}", decoder.config().dpb_max_size);
    let mut pictures = Vec::new();
    for chunk in data.chunks(READ_CHUNK_SIZE) {
        decoder.send_data(chunk).context("送入码流失败")?;
        drain_pictures(&mut decoder, &mut pictures)?;
    }
    decoder.send_eos().context("结束码流失败")?;
    drain_pictures(&mut decoder, &mut pictures)?;
    info!("解析完成: {} 帧", pictures.len());

    let active_sps = decoder.picture().desc.sps.clone();
    let sequence = decoder.backend().template().map(|t| SequenceInfo {
        profile: t.profile.name(),
        level_idc: t.level_idc,
        width: t.width,
        height: t.height,
        display_width: active_sps.as_ref().map_or(t.width, |sps| sps.display_width()),
        display_height: active_sps.as_ref().map_or(t.height, |sps| sps.display_height()),
        chroma_format: format!("{:?}", t.chroma_format),
    });

    Ok(ProbeOutput {
        filename: filename.to_string(),
        total_bytes: data.len(),
        nal_units,
        sequence,
        pictures,
    })
}

fn drain_pictures(
    decoder: &mut HevcDecoder<NullBackend>,
    pictures: &mut Vec<PictureInfo>,
) -> Result<()> {
    loop {
        match decoder.receive_picture() {
            Ok(picture) => pictures.push(PictureInfo {
                decode_index: picture.decode_index,
                poc: picture.poc,
                nal_type: picture.nal_type.name(),
                slices: picture.target.slices,
                bytes: picture.target.bytes,
            }),
            Err(LumenError::NeedMoreData) | Err(LumenError::Eof) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

/// 文本输出: NAL 统计
fn print_nal_text(output: &ProbeOutput) {
    println!("[NAL]");
    println!("  文件名       : {}", output.filename);
    println!("  数据总量     : {} 字节", output.total_bytes);
    for nal in &output.nal_units {
        println!("  {:>2} {:<12}: {}", nal.nal_type, nal.name, nal.count);
    }
    println!("[/NAL]");
    println!();
}

/// 文本输出: 序列信息
fn print_sequence_text(sequence: &SequenceInfo) {
    println!("[SEQUENCE]");
    println!("  Profile      : {}", sequence.profile);
    println!("  Level        : {}", sequence.level_idc);
    println!("  分辨率       : {}x{}", sequence.width, sequence.height);
    println!(
        "  显示尺寸     : {}x{}",
        sequence.display_width, sequence.display_height
    );
    println!("  色度格式     : {}", sequence.chroma_format);
    println!("[/SEQUENCE]");
    println!();
}

/// 文本输出: 图像列表 (显示顺序)
fn print_pictures_text(pictures: &[PictureInfo]) {
    println!("[PICTURES]");
    for p in pictures {
        println!(
            "  #{:<6} poc={:<6} {:<10} slices={:<3} bytes={}",
            p.decode_index, p.poc, p.nal_type, p.slices, p.bytes
        );
    }
    println!("  图像总数     : {}", pictures.len());
    println!("[/PICTURES]");
    println!();
}

/// 打印版本横幅
fn print_banner() {
    println!(
        "lumen-probe 版本 {} -- 纯 Rust HEVC 码流探测工具",
        lumen::version()
    );
    println!();
    println!("用法: lumen-probe [选项] <输入文件>");
    println!();
    println!("选项:");
    println!("  --json            以 JSON 格式输出");
    println!("  --dpb-size <N>    DPB 容量 (1-16)");
    println!("  -v, --verbose     提高日志详细程度 (可重复)");
    println!("  -q, --quiet       静默模式");
    println!("  --log-dir <DIR>   同时写入日志文件");
    println!();
    println!("使用 --help 查看完整用法.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_hevc::testing::{SliceParams, SpsParams, StreamBuilder};

    fn sample_stream() -> Vec<u8> {
        StreamBuilder::new()
            .aud()
            .sps(&SpsParams::default())
            .pps(&Default::default())
            .slice(&SliceParams::idr())
            .slice(&SliceParams::idr().next_slice(4))
            .slice(&SliceParams::trail(4))
            .slice(&SliceParams::trail(2).non_reference())
            .build()
    }

    #[test]
    fn test_probe_统计与输出顺序() {
        let output = probe("sample.h265", &sample_stream(), DecoderConfig::default()).unwrap();

        let idr = output
            .nal_units
            .iter()
            .find(|n| n.name == "IDR_W_RADL")
            .unwrap();
        assert_eq!(idr.count, 2);
        assert_eq!(output.nal_units.len(), 6);

        let pocs: Vec<i32> = output.pictures.iter().map(|p| p.poc).collect();
        assert_eq!(pocs, vec![0, 2, 4]);
        assert_eq!(output.pictures[0].slices, 2);
        assert_eq!(output.pictures[1].decode_index, 2);

        let sequence = output.sequence.unwrap();
        assert_eq!((sequence.width, sequence.height), (64, 64));
        assert_eq!((sequence.display_width, sequence.display_height), (64, 64));
        assert_eq!(sequence.level_idc, 93);
    }

    #[test]
    fn test_probe_显示尺寸() {
        let stream = StreamBuilder::new()
            .sps(&SpsParams {
                conf_win: Some([2, 2, 1, 1]),
                ..SpsParams::default()
            })
            .pps(&Default::default())
            .slice(&SliceParams::idr())
            .build();
        let output = probe("crop.h265", &stream, DecoderConfig::default()).unwrap();
        let sequence = output.sequence.unwrap();
        assert_eq!((sequence.width, sequence.height), (64, 64));
        assert_eq!((sequence.display_width, sequence.display_height), (56, 60));
    }

    #[test]
    fn test_probe_读取文件_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.h265");
        std::fs::write(&path, sample_stream()).unwrap();

        let data = std::fs::read(&path).unwrap();
        let output = probe("sample.h265", &data, DecoderConfig::default()).unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["pictures"].as_array().unwrap().len(), 3);
        assert_eq!(json["sequence"]["profile"], "Main");
    }

    #[test]
    fn test_cli_参数() {
        let cli = Cli::parse_from(["lumen-probe", "a.h265", "--json", "--dpb-size", "4", "-vv"]);
        assert_eq!(cli.input.as_deref(), Some("a.h265"));
        assert!(cli.json);
        assert_eq!(cli.dpb_size, Some(4));
        assert_eq!(cli.verbose, 2);
    }
}
