use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_orders_table::Migration),
            Box::new(m20240101_000002_create_shipments_table::Migration),
            Box::new(m20240101_000003_create_shipment_events_table::Migration),
            Box::new(m20240101_000004_create_fulfillment_failures_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Currency).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().not_null())
                        .col(ColumnDef::new(Orders::CustomerDocument).string().null())
                        .col(ColumnDef::new(Orders::CustomerPhone).string().null())
                        .col(ColumnDef::new(Orders::CustomerEmail).string().null())
                        .col(ColumnDef::new(Orders::AddressLine1).string().not_null())
                        .col(ColumnDef::new(Orders::AddressLine2).string().null())
                        .col(ColumnDef::new(Orders::City).string().not_null())
                        .col(ColumnDef::new(Orders::State).string().not_null())
                        .col(ColumnDef::new(Orders::PostalCode).string().not_null())
                        .col(ColumnDef::new(Orders::Country).string().not_null())
                        .col(ColumnDef::new(Orders::CarrierName).string().not_null())
                        .col(ColumnDef::new(Orders::ServiceCode).string().not_null())
                        .col(ColumnDef::new(Orders::ServiceName).string().not_null())
                        .col(
                            ColumnDef::new(Orders::ShippingCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::InsuranceCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::WeightKg).decimal().not_null())
                        .col(ColumnDef::new(Orders::DimensionsCm).string().null())
                        .col(ColumnDef::new(Orders::DeliveryMinDays).integer().not_null())
                        .col(ColumnDef::new(Orders::DeliveryMaxDays).integer().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_payment_status")
                        .table(Orders::Table)
                        .col(Orders::PaymentStatus)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        PaymentStatus,
        TotalAmount,
        Currency,
        CustomerName,
        CustomerDocument,
        CustomerPhone,
        CustomerEmail,
        AddressLine1,
        AddressLine2,
        City,
        State,
        PostalCode,
        Country,
        CarrierName,
        ServiceCode,
        ServiceName,
        ShippingCost,
        InsuranceCost,
        WeightKg,
        DimensionsCm,
        DeliveryMinDays,
        DeliveryMaxDays,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_shipments_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000001_create_orders_table::Orders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_shipments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::CarrierName).string().not_null())
                        .col(ColumnDef::new(Shipments::ServiceCode).string().not_null())
                        .col(ColumnDef::new(Shipments::ServiceName).string().not_null())
                        .col(
                            ColumnDef::new(Shipments::ShippingCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Shipments::InsuranceCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Shipments::WeightKg).decimal().not_null())
                        .col(ColumnDef::new(Shipments::DimensionsCm).string().null())
                        .col(ColumnDef::new(Shipments::RecipientName).string().not_null())
                        .col(ColumnDef::new(Shipments::RecipientDocument).string().null())
                        .col(ColumnDef::new(Shipments::RecipientPhone).string().null())
                        .col(ColumnDef::new(Shipments::RecipientEmail).string().null())
                        .col(ColumnDef::new(Shipments::AddressLine1).string().not_null())
                        .col(ColumnDef::new(Shipments::AddressLine2).string().null())
                        .col(ColumnDef::new(Shipments::City).string().not_null())
                        .col(ColumnDef::new(Shipments::State).string().not_null())
                        .col(ColumnDef::new(Shipments::PostalCode).string().not_null())
                        .col(ColumnDef::new(Shipments::Country).string().not_null())
                        .col(
                            ColumnDef::new(Shipments::DeliveryMinDays)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::DeliveryMaxDays)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipments::CartReference).string().null())
                        .col(ColumnDef::new(Shipments::CarrierShipmentId).string().null())
                        .col(ColumnDef::new(Shipments::TrackingNumber).string().null())
                        .col(ColumnDef::new(Shipments::LabelUrl).string().null())
                        .col(ColumnDef::new(Shipments::Status).string().not_null())
                        .col(
                            ColumnDef::new(Shipments::LabelGeneratedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::PostedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipments_order_id")
                                .from(Shipments::Table, Shipments::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_order_id")
                        .table(Shipments::Table)
                        .col(Shipments::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_status")
                        .table(Shipments::Table)
                        .col(Shipments::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_tracking_number")
                        .table(Shipments::Table)
                        .col(Shipments::TrackingNumber)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_carrier_shipment_id")
                        .table(Shipments::Table)
                        .col(Shipments::CarrierShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Shipments {
        Table,
        Id,
        OrderId,
        CarrierName,
        ServiceCode,
        ServiceName,
        ShippingCost,
        InsuranceCost,
        WeightKg,
        DimensionsCm,
        RecipientName,
        RecipientDocument,
        RecipientPhone,
        RecipientEmail,
        AddressLine1,
        AddressLine2,
        City,
        State,
        PostalCode,
        Country,
        DeliveryMinDays,
        DeliveryMaxDays,
        CartReference,
        CarrierShipmentId,
        TrackingNumber,
        LabelUrl,
        Status,
        LabelGeneratedAt,
        PostedAt,
        DeliveredAt,
        CancelledAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_shipment_events_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_shipments_table::Shipments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_shipment_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentEvents::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentEvents::Code).string().null())
                        .col(
                            ColumnDef::new(ShipmentEvents::Description)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentEvents::EventKey).string().not_null())
                        .col(ColumnDef::new(ShipmentEvents::Status).string().not_null())
                        .col(ColumnDef::new(ShipmentEvents::City).string().null())
                        .col(ColumnDef::new(ShipmentEvents::State).string().null())
                        .col(ColumnDef::new(ShipmentEvents::Country).string().null())
                        .col(
                            ColumnDef::new(ShipmentEvents::EventAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentEvents::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_shipment_events_shipment_id")
                                .from(ShipmentEvents::Table, ShipmentEvents::ShipmentId)
                                .to(Shipments::Table, Shipments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Dedup guard: one event per (shipment, key, occurrence time)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_shipment_events_dedup")
                        .table(ShipmentEvents::Table)
                        .col(ShipmentEvents::ShipmentId)
                        .col(ShipmentEvents::EventKey)
                        .col(ShipmentEvents::EventAt)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_events_shipment_id")
                        .table(ShipmentEvents::Table)
                        .col(ShipmentEvents::ShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ShipmentEvents {
        Table,
        Id,
        ShipmentId,
        Code,
        Description,
        EventKey,
        Status,
        City,
        State,
        Country,
        EventAt,
        CreatedAt,
    }
}

mod m20240101_000004_create_fulfillment_failures_table {

    use sea_orm_migration::prelude::*;

    use super::m20240101_000002_create_shipments_table::Shipments;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_fulfillment_failures_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(FulfillmentFailures::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FulfillmentFailures::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentFailures::ShipmentId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FulfillmentFailures::Step).string().not_null())
                        .col(
                            ColumnDef::new(FulfillmentFailures::Message)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentFailures::Attempts)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FulfillmentFailures::FailedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_fulfillment_failures_shipment_id")
                                .from(FulfillmentFailures::Table, FulfillmentFailures::ShipmentId)
                                .to(Shipments::Table, Shipments::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_fulfillment_failures_shipment_id")
                        .table(FulfillmentFailures::Table)
                        .col(FulfillmentFailures::ShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FulfillmentFailures::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum FulfillmentFailures {
        Table,
        Id,
        ShipmentId,
        Step,
        Message,
        Attempts,
        FailedAt,
    }
}
