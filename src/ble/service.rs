use bt_hci::uuid::{characteristic, service};
use trouble_host::prelude::{gatt_server, gatt_service};

use crate::codec::Record;

#[gatt_server]
pub struct Server {
    pub weight_scale: WeightScaleService,
    pub body_composition: BodyCompositionService,
    pub current_time: CurrentTimeService,
    pub user_data: UserDataService,
}

#[gatt_service(uuid = service::WEIGHT_SCALE)]
pub struct WeightScaleService {
    #[characteristic(uuid = characteristic::WEIGHT_SCALE_FEATURE, read)]
    pub feature: Record,

    #[characteristic(uuid = characteristic::WEIGHT_MEASUREMENT, indicate)]
    pub measurement: Record,
}

#[gatt_service(uuid = service::BODY_COMPOSITION)]
pub struct BodyCompositionService {
    #[characteristic(uuid = characteristic::BODY_COMPOSITION_FEATURE, read)]
    pub feature: Record,

    #[characteristic(uuid = characteristic::BODY_COMPOSITION_MEASUREMENT, indicate)]
    pub measurement: Record,
}

#[gatt_service(uuid = service::CURRENT_TIME)]
pub struct CurrentTimeService {
    #[characteristic(uuid = characteristic::CURRENT_TIME, read, write, notify)]
    pub current_time: Record,
}

#[gatt_service(uuid = service::USER_DATA)]
pub struct UserDataService {
    #[characteristic(uuid = characteristic::HEIGHT, read, write)]
    pub height: Record,

    #[characteristic(uuid = characteristic::WEIGHT, read, write)]
    pub weight: Record,

    #[characteristic(uuid = characteristic::DATABASE_CHANGE_INCREMENT, read, write, notify)]
    pub database_change_increment: Record,

    #[characteristic(uuid = characteristic::USER_INDEX, read)]
    pub user_index: Record,

    #[characteristic(uuid = characteristic::USER_CONTROL_POINT, write, indicate)]
    pub control_point: Record,
}
