use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use tokio::time::interval;
use tracing::{info, warn};

use audio_receive_stream::channel::SdpAudioFormat;
use audio_receive_stream::channel::decoder::encode_l16;
use audio_receive_stream::rtp::rtcp::serialize_compound;
use audio_receive_stream::rtp::{RtcpPacket, RtpPacketReceived, SenderReport};
use audio_receive_stream::{
    AudioFrame, AudioReceiveStream, AudioState, Clock, PacketRouter, ReceiveStreamConfig,
    SsrcDemuxer, Syncable, TracingEventLog,
};

const PAYLOAD_TYPE: u8 = 96;
const PACKET_MS: u64 = 20;

#[derive(Parser)]
#[command(name = "rx-loopback")]
#[command(about = "Feeds a synthetic L16 stream through one audio receive stream", long_about = None)]
struct Cli {
    #[arg(long, default_value_t = 12345)]
    ssrc: u32,

    /// Seconds to run.
    #[arg(short, long, default_value_t = 5)]
    duration: u64,

    /// Codec clock rate of the synthetic stream.
    #[arg(long, default_value_t = 16000)]
    rate: u32,

    /// Mixer output rate.
    #[arg(long, default_value_t = 48000)]
    mix_rate: u32,

    /// Packet loss probability.
    #[arg(long, default_value_t = 0.02)]
    loss: f64,

    /// Probability that a packet is held back and sent after its successor.
    #[arg(long, default_value_t = 0.05)]
    reorder: f64,

    /// JSON config; overrides --ssrc and --rate.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn build_config(cli: &Cli) -> anyhow::Result<ReceiveStreamConfig> {
    if let Some(path) = &cli.config {
        return ReceiveStreamConfig::from_json_file(path);
    }
    let mut config = ReceiveStreamConfig::default();
    config.rtp.remote_ssrc = cli.ssrc;
    config.rtp.local_ssrc = cli.ssrc.wrapping_add(1);
    config.rtp.nack.enabled = true;
    config
        .decoder_map
        .insert(PAYLOAD_TYPE, SdpAudioFormat::new("L16", cli.rate, 1));
    config.sync_group = "loopback".to_string();
    config.initial_min_playout_delay_ms = 40;
    Ok(config)
}

/// 440 Hz tone, one packet's worth starting at `timestamp`.
fn tone(timestamp: u32, rate: u32) -> Vec<i16> {
    let samples = (rate as u64 * PACKET_MS / 1000) as u32;
    (0..samples)
        .map(|i| {
            let t = (timestamp.wrapping_add(i)) as f64 / rate as f64;
            ((t * 440.0 * std::f64::consts::TAU).sin() * 8000.0) as i16
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let ssrc = config.rtp.remote_ssrc;
    let (payload_type, rate) = config
        .decoder_map
        .iter()
        .next()
        .map(|(&pt, format)| (pt, format.clock_rate_hz))
        .context("Config has no decoders")?;

    let audio_state = Arc::new(AudioState::default());
    let demuxer = Arc::new(SsrcDemuxer::new());
    let router = Arc::new(PacketRouter::new());
    let stream = Arc::new(AudioReceiveStream::new(
        demuxer.clone(),
        router,
        config,
        audio_state.clone(),
        Arc::new(TracingEventLog),
    )?);
    stream.start();
    info!("Receiving SSRC {:#010x} at {} Hz for {} s", ssrc, rate, cli.duration);

    let sender = {
        let stream = stream.clone();
        let demuxer = demuxer.clone();
        let clock = audio_state.clock().clone();
        let (loss, reorder) = (cli.loss, cli.reorder);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(PACKET_MS));
            let samples_per_packet = (rate as u64 * PACKET_MS / 1000) as u32;
            let mut held: Option<RtpPacketReceived> = None;
            let mut seq: u16 = 0;
            loop {
                ticker.tick().await;
                let timestamp = seq as u32 * samples_per_packet;
                let packet = RtpPacketReceived::new(
                    ssrc,
                    seq,
                    timestamp,
                    payload_type,
                    encode_l16(&tone(timestamp, rate)),
                )
                .with_arrival_time(clock.now_ms());

                // Once a second, like a real sender.
                if seq % 50 == 0 {
                    let sr = serialize_compound(&[RtcpPacket::SenderReport(SenderReport {
                        ssrc,
                        ntp: clock.now_ntp(),
                        rtp_timestamp: timestamp,
                        packet_count: seq as u32,
                        octet_count: seq as u32 * samples_per_packet * 2,
                        report_blocks: vec![],
                    })]);
                    if let Err(e) = stream.deliver_rtcp(&sr) {
                        warn!("Sender report rejected: {}", e);
                    }
                }
                seq = seq.wrapping_add(1);

                let (drop_it, hold_it) = {
                    let mut rng = rand::thread_rng();
                    (rng.gen_bool(loss), rng.gen_bool(reorder))
                };
                if drop_it {
                    continue;
                }
                if hold_it && held.is_none() {
                    held = Some(packet);
                    continue;
                }
                demuxer.deliver(packet);
                if let Some(late) = held.take() {
                    demuxer.deliver(late);
                }
            }
        })
    };

    let mixer = {
        let audio_state = audio_state.clone();
        let mix_rate = cli.mix_rate;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(10));
            let mut frame = AudioFrame::default();
            let mut ticks: u64 = 0;
            loop {
                ticker.tick().await;
                audio_state.mixer().mix(mix_rate, 2, &mut frame);
                ticks += 1;
                if ticks % 100 == 0 {
                    let peak = frame.data().iter().map(|s| s.unsigned_abs()).max();
                    info!("Mixer tick {}: peak {:?}", ticks, peak);
                }
            }
        })
    };

    tokio::time::sleep(Duration::from_secs(cli.duration)).await;
    sender.abort();
    mixer.abort();
    stream.stop();

    let stats = stream.get_stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);

    match stream.get_info() {
        Some(playout) => {
            let rendered = playout
                .estimated_playout_ntp
                .to_datetime()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "invalid".to_string());
            println!(
                "Playout: rtp {} captured at {} delay {} ms",
                playout.playout_timestamp_rtp, rendered, playout.current_delay_ms
            );
        }
        None => println!("Playout: no sender report or audio yet"),
    }
    Ok(())
}
