//! trouble-host glue: advertising, the connection loop and the GATT table.

use bt_hci::controller::ExternalController;
use bt_hci::param::{AddrKind, BdAddr};
use embassy_futures::join::join;
use embassy_futures::select::{select3, Either3};
use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_hal::peripherals::BT;
use esp_wifi::{ble::controller::BleConnector, EspWifiController};
use static_cell::StaticCell;
use trouble_host::prelude::*;

use super::config::{
    BodyCompositionHandles, Config, CurrentTimeHandles, Handles, UserDataHandles,
    WeightScaleHandles,
};
use super::error::{AttError, TransportError};
use super::service::Server;
use super::transport::{Dispatch, GattTransport, TimerControl, TimerId};
use super::{Peripheral, ReadOutcome, WriteOutcome};
use crate::codec::Record;
use crate::sensor::SyntheticSource;

const L2CAP_MTU: usize = 255;
const CONNECTIONS_MAX: usize = 1;
const L2CAP_CHANNELS_MAX: usize = 2;

type Resources = HostResources<CONNECTIONS_MAX, L2CAP_CHANNELS_MAX, L2CAP_MTU>;

static RESOURCES: StaticCell<Resources> = StaticCell::new();

const ADDRESS: Address = Address {
    kind: AddrKind::RANDOM,
    addr: BdAddr::new([0xc4, 0x5a, 0x10, 0x7e, 0x21, 0xd3]),
};

/// Updates the services produced during one event, sent after it is handled.
#[derive(Default)]
struct Outbox {
    updates: heapless::Vec<(u16, Record, Dispatch), 8>,
    running: [bool; 3],
}

impl Outbox {
    fn slot(timer: TimerId) -> usize {
        match timer {
            TimerId::WeightScale => 0,
            TimerId::BodyComposition => 1,
            TimerId::CurrentTime => 2,
        }
    }
}

impl GattTransport for Outbox {
    fn update_characteristic(
        &mut self,
        handle: u16,
        offset: u16,
        value: &[u8],
        dispatch: Dispatch,
    ) -> Result<(), TransportError> {
        // Every value is written whole
        debug_assert_eq!(offset, 0);

        let value = Record::from_slice(value).map_err(|_| TransportError::Encoding)?;
        self.updates
            .push((handle, value, dispatch))
            .map_err(|_| TransportError::Rejected(0))
    }
}

impl TimerControl for Outbox {
    fn start_timer(&mut self, timer: TimerId) {
        self.running[Self::slot(timer)] = true;
    }

    fn stop_timer(&mut self, timer: TimerId) {
        self.running[Self::slot(timer)] = false;
    }
}

#[derive(Debug, defmt::Format)]
enum HostError {
    GattTable,
}

fn att_error(err: AttError) -> AttErrorCode {
    AttErrorCode::from(err.code())
}

/// BLE stack and the services behind it
struct Ble<'a, C: Controller> {
    config: Config,
    peripheral: trouble_host::prelude::Peripheral<'a, C>,
    server: Server<'a>,
    services: Peripheral<SyntheticSource>,
    outbox: Outbox,
}

impl<'a, C: Controller> Ble<'a, C> {
    fn new(
        peripheral: trouble_host::prelude::Peripheral<'a, C>,
        mut config: Config,
    ) -> Result<Self, HostError> {
        let server = Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
            name: config.name,
            appearance: &appearance::weight_scale::GENERIC_WEIGHT_SCALE,
        }))
        .map_err(|_| HostError::GattTable)?;

        config.handles = handles(&server);
        let source = SyntheticSource::new(config.body, Instant::now().as_ticks());
        let mut services = Peripheral::new(&config, source, Instant::now().as_millis());

        let mut outbox = Outbox::default();
        if let Err(err) = services.init(&mut outbox) {
            defmt::error!("[ble] init failed: {:?}", err);
        }

        let mut ble = Self {
            config,
            peripheral,
            server,
            services,
            outbox,
        };
        ble.store_pending();
        Ok(ble)
    }

    async fn start(stack: &'a Stack<'a, C>, config: Config) -> Result<(), HostError> {
        let Host {
            peripheral, runner, ..
        } = stack.build();

        let mut ble = Self::new(peripheral, config)?;

        join(ble_task(runner), async move { ble.run_connection_loop().await }).await;

        Ok(())
    }

    async fn run_connection_loop(&mut self) {
        loop {
            match advertise(self.config.name, &mut self.peripheral).await {
                Ok(conn) => {
                    defmt::info!("[ble] connected");
                    self.connection_task(&conn).await;

                    defmt::info!("[ble] disconnected");
                    self.services.on_disconnect();
                    self.outbox.updates.clear();
                }
                Err(_) => {
                    defmt::error!("[ble] error establishing a connection");
                    Timer::after_secs(1).await;
                }
            }
        }
    }

    /// GATT events, measurement ticks and deferred tasks, all on this one task.
    async fn connection_task(&mut self, conn: &Connection<'_>) {
        let mut ticker = Ticker::every(Duration::from_millis(self.config.measurement_interval_ms));

        loop {
            let event = select3(conn.next(), ticker.next(), self.services.next_task()).await;

            match event {
                Either3::First(ConnectionEvent::Disconnected { reason: _ }) => break,
                Either3::First(ConnectionEvent::Gatt { data }) => {
                    if self.gatt_event(data).await.is_err() {
                        break;
                    }
                }
                Either3::Second(()) => {
                    let now = Instant::now().as_millis();
                    for timer in [TimerId::WeightScale, TimerId::BodyComposition, TimerId::CurrentTime] {
                        if self.outbox.running[Outbox::slot(timer)] {
                            self.services.on_timer_expired(timer, now);
                        }
                    }
                }
                Either3::Third(task) => self.services.execute(task, &mut self.outbox),
            }

            self.flush(conn).await;
        }
    }

    async fn gatt_event(&mut self, data: GattData<'_>) -> Result<(), Error> {
        let Some(event) = data.process(&self.server).await? else {
            return Ok(());
        };

        let reply = match &event {
            GattEvent::Read(read) => match self.services.on_read_request(read.handle()) {
                ReadOutcome::Allow => None,
                ReadOutcome::Deny(err) => Some(err),
            },
            GattEvent::Write(write) => {
                match self
                    .services
                    .on_attribute_write(write.handle(), write.data(), &mut self.outbox)
                {
                    WriteOutcome::Accepted | WriteOutcome::Unhandled => None,
                    WriteOutcome::Rejected(err) => Some(err),
                    // The response already went out on the control point
                    WriteOutcome::NotAcknowledged => return Ok(()),
                }
            }
        };

        let reply = match reply {
            None => event.accept(),
            Some(err) => event.reject(att_error(err)),
        };
        if let Ok(reply) = reply {
            reply.send().await;
        }

        Ok(())
    }

    /// Store every queued update and push the ones that transmit.
    async fn flush(&mut self, conn: &Connection<'_>) {
        for (handle, value, dispatch) in core::mem::take(&mut self.outbox.updates) {
            let Some(characteristic) = self.characteristic(handle) else {
                defmt::warn!("[ble] no characteristic at {:#x}", handle);
                continue;
            };

            let result = if dispatch.transmits() {
                // The pinned trouble-host revision only notifies, so Indicate goes out as a notification
                characteristic.notify(&self.server, conn, &value).await
            } else {
                self.server.set(&characteristic, &value)
            };

            if result.is_err() {
                defmt::warn!("[ble] failed to update {:#x}", handle);
            }
        }
    }

    /// Values queued before the first connection are only stored.
    fn store_pending(&mut self) {
        for (handle, value, _) in core::mem::take(&mut self.outbox.updates) {
            if let Some(characteristic) = self.characteristic(handle) {
                if self.server.set(&characteristic, &value).is_err() {
                    defmt::warn!("[ble] failed to store {:#x}", handle);
                }
            }
        }
    }

    fn characteristic(&self, handle: u16) -> Option<Characteristic<Record>> {
        let wss = &self.server.weight_scale;
        let bcs = &self.server.body_composition;
        let uds = &self.server.user_data;

        [
            wss.feature,
            wss.measurement,
            bcs.feature,
            bcs.measurement,
            self.server.current_time.current_time,
            uds.height,
            uds.weight,
            uds.database_change_increment,
            uds.user_index,
            uds.control_point,
        ]
        .into_iter()
        .find(|characteristic| characteristic.handle == handle)
    }
}

fn handles(server: &Server<'_>) -> Handles {
    let cccd = |characteristic: &Characteristic<Record>| characteristic.cccd_handle.unwrap_or_default();
    let wss = &server.weight_scale;
    let bcs = &server.body_composition;
    let cts = &server.current_time;
    let uds = &server.user_data;

    Handles {
        weight_scale: WeightScaleHandles {
            feature: wss.feature.handle,
            measurement: wss.measurement.handle,
            measurement_cccd: cccd(&wss.measurement),
        },
        body_composition: BodyCompositionHandles {
            feature: bcs.feature.handle,
            measurement: bcs.measurement.handle,
            measurement_cccd: cccd(&bcs.measurement),
        },
        current_time: CurrentTimeHandles {
            current_time: cts.current_time.handle,
            current_time_cccd: cccd(&cts.current_time),
        },
        user_data: UserDataHandles {
            height: uds.height.handle,
            weight: uds.weight.handle,
            database_change_increment: uds.database_change_increment.handle,
            database_change_increment_cccd: cccd(&uds.database_change_increment),
            user_index: uds.user_index.handle,
            control_point: uds.control_point.handle,
            control_point_cccd: cccd(&uds.control_point),
        },
    }
}

/// Run the BLE host stack task
async fn ble_task<C: Controller>(mut runner: Runner<'_, C>) {
    loop {
        if let Err(e) = runner.run().await {
            defmt::error!("[ble] host stack error: {:?}", e);
        }

        embassy_futures::yield_now().await;
    }
}

async fn advertise<'a, C: Controller>(
    name: &'a str,
    peripheral: &mut trouble_host::prelude::Peripheral<'a, C>,
) -> Result<Connection<'a>, BleHostError<C::Error>> {
    let mut advertiser_data = [0; 31];
    let adv_len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::ServiceUuids16(&[
                service::WEIGHT_SCALE.to_le_bytes(),
                service::BODY_COMPOSITION.to_le_bytes(),
                service::USER_DATA.to_le_bytes(),
            ]),
        ],
        &mut advertiser_data[..],
    )?;

    let mut scan_data = [0; 31];
    let scan_len = AdStructure::encode_slice(
        &[AdStructure::CompleteLocalName(name.as_bytes())],
        &mut scan_data[..],
    )?;

    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &advertiser_data[..adv_len],
                scan_data: &scan_data[..scan_len],
            },
        )
        .await?;

    Ok(advertiser.accept().await?)
}

/// Initialize and start the BLE module
#[embassy_executor::task]
pub async fn start(bt: BT, init: EspWifiController<'static>) {
    defmt::info!("[ble] starting");
    let connector = BleConnector::new(&init, bt);
    let controller: ExternalController<_, 20> = ExternalController::new(connector);

    let resources = RESOURCES.init(Resources::new());
    let stack = trouble_host::new(controller, resources).set_random_address(ADDRESS);

    if let Err(err) = Ble::start(&stack, Config::default()).await {
        defmt::error!("[ble] stopped: {:?}", err);
    }
}
