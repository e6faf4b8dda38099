use core::convert::TryInto;
use std::{
    sync::{Arc, Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use dht_sensor::dht22;
use embedded_svc::{
    http::Method,
    io::Write,
    wifi::{AccessPointConfiguration, AuthMethod, Configuration},
};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, AnyOutputPin, IOPin, InputOutput, Output, OutputPin, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::server::{Configuration as HttpConfiguration, EspHttpServer},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use icebox_common::{config::NetworkConfig, CoolerEngine, RuntimeConfig, SensorError};

use crate::page;

const DHT22_GPIO: i32 = 2;
const HTTP_STACK_SIZE: usize = 8 * 1024;
const CONTROL_LOOP_STACK_SIZE: usize = 8 * 1024;

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let runtime = RuntimeConfig::default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let wifi = start_access_point(
        peripherals.modem,
        sys_loop,
        nvs_partition,
        &runtime.network,
    )?;

    // Relay on GPIO0, DHT22 data line on GPIO2 on the reference board.
    let relay = RelayPin::new(pins.gpio0.downgrade_output())?;
    let sensor = Dht22Sensor::new(pins.gpio2.downgrade())?;

    let engine = Arc::new(Mutex::new(CoolerEngine::new(
        runtime.control,
        monotonic_ms(),
    )));
    let poll_interval_ms = engine.lock().unwrap().config.poll_interval_ms;

    spawn_control_loop(engine.clone(), sensor, relay, poll_interval_ms)?;
    let server = create_http_server(engine)?;

    info!(
        "cooler controller ready on access point `{}`",
        runtime.network.ap_ssid
    );

    // Keep services alive for the program lifetime.
    let _wifi = wifi;
    let _server = server;

    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn start_access_point(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
        ssid: network
            .ap_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("AP SSID too long"))?,
        password: network
            .ap_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("AP passphrase too long"))?,
        auth_method: AuthMethod::WPA2Personal,
        channel: 1,
        ..Default::default()
    }))?;
    wifi.start()?;
    wifi.wait_netif_up()?;
    info!("access point `{}` up", network.ap_ssid);

    Ok(esp_wifi)
}

struct Dht22Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl Dht22Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }

    fn read_temperature(&mut self) -> Result<f32, SensorError> {
        // The line must idle high before the start pulse.
        if let Err(err) = self.pin.set_high() {
            warn!("failed to raise DHT22 line before read: {err:?}");
        }

        match dht22::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => Ok(reading.temperature),
            Err(err) => {
                warn!("DHT22 read failed on GPIO{DHT22_GPIO}: {err:?}");
                Err(SensorError::Unreadable)
            }
        }
    }
}

struct RelayPin {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl RelayPin {
    fn new(pin: AnyOutputPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::output(pin)?;
        // Relay board is active-low; boot with the relay released.
        pin.set_high()?;
        Ok(Self { pin })
    }

    fn set_output(&mut self, on: bool) {
        let result = if on {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };

        if let Err(err) = result {
            warn!("failed to drive relay pin: {err:?}");
        }
    }
}

fn spawn_control_loop(
    engine: Arc<Mutex<CoolerEngine>>,
    mut sensor: Dht22Sensor,
    mut relay: RelayPin,
    poll_interval_ms: u64,
) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("control-loop".into())
        .stack_size(CONTROL_LOOP_STACK_SIZE)
        .spawn(move || loop {
            let now_ms = monotonic_ms();
            let reading = sensor.read_temperature();

            {
                let mut engine = engine.lock().unwrap();
                match reading {
                    Ok(temp_c) if engine.config.is_plausible(temp_c) => {
                        if let Some(state) = engine.record_sample(temp_c, now_ms) {
                            info!(
                                "average {:.2} degC, relay {}",
                                engine.average_temp_c(),
                                state.as_str()
                            );
                            relay.set_output(state.is_on());
                        }
                    }
                    Ok(temp_c) => {
                        warn!("skipping cycle: {}", SensorError::OutOfRange(temp_c));
                        engine.record_read_failure();
                    }
                    Err(err) => {
                        warn!("skipping cycle: {err}");
                        engine.record_read_failure();
                    }
                }
            }

            thread::sleep(Duration::from_millis(poll_interval_ms));
        })
        .context("failed to spawn control loop thread")?;

    Ok(())
}

fn create_http_server(engine: Arc<Mutex<CoolerEngine>>) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: HTTP_STACK_SIZE,
        ..Default::default()
    };

    let mut server = EspHttpServer::new(&conf)?;

    {
        let engine = engine.clone();
        server.fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
            let status = engine.lock().unwrap().status(monotonic_ms());
            let body = page::render_status_page(&status);
            req.into_ok_response()?.write_all(body.as_bytes())?;
            Ok(())
        })?;
    }

    {
        let engine = engine.clone();
        server.fn_handler::<anyhow::Error, _>("/api/status", Method::Get, move |req| {
            let status = engine.lock().unwrap().status(monotonic_ms());
            let body = serde_json::to_string(&status)?;
            let mut response =
                req.into_response(200, Some("OK"), &[("Content-Type", "application/json")])?;
            response.write_all(body.as_bytes())?;
            Ok(())
        })?;
    }

    Ok(server)
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
