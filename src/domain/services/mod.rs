//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// | Module         | Description                                                        |
// |----------------|--------------------------------------------------------------------|
// | subscriptions  | Connections, filters, registry and the subscription manager       |
// | events         | Encodes typed events and routes them through the manager          |
// | ledger         | Ledger header and book state used for subscribe acknowledgments   |
// | validation     | Account address and currency checks                                |
// | webhook        | HTTP delivery to URL callbacks                                     |
//--------------------------------------------------------------------------------------------------

pub mod events;
pub mod ledger;
pub mod subscriptions;
pub mod validation;
pub mod webhook;
