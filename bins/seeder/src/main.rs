//! Database seeder for Carryover development and testing.
//!
//! Seeds a family account book with a registered and a custodial member,
//! two months of budget periods, and sample expenses. Some rows are left
//! the way legacy data looks (unattributed, drifted) so `budgetctl repair`
//! has something to do.
//!
//! Usage: cargo run --bin seeder

use chrono::{Datelike, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;
use carryover_db::entities::{
    account_books, budget_periods, families, family_members,
    sea_orm_active_enums::{OwnerKind, PeriodLength, TransactionType},
    transactions,
};

const DEMO_FAMILY_ID: &str = "00000000-0000-0000-0000-00000000f001";
const DEMO_BOOK_ID: &str = "00000000-0000-0000-0000-00000000b001";
const PARENT_USER_ID: &str = "00000000-0000-0000-0000-00000000a001";
const PARENT_MEMBER_ID: &str = "00000000-0000-0000-0000-00000000c001";
const KID_MEMBER_ID: &str = "00000000-0000-0000-0000-00000000c002";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = carryover_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    if account_books::Entity::find_by_id(id(DEMO_BOOK_ID))
        .one(&db)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        println!("Demo account book already exists, skipping...");
        return;
    }

    println!("Seeding demo family...");
    seed_family(&db).await;

    println!("Seeding budget periods...");
    seed_periods(&db).await;

    println!("Seeding transactions...");
    seed_transactions(&db).await;

    println!("Seeding complete!");
}

fn id(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap()
}

/// First day of the month `back` months before the current one.
fn month_start(back: u32) -> NaiveDate {
    let today = Utc::now().date_naive();
    let first = today.with_day(1).unwrap();
    first - Months::new(back)
}

fn month_end(start: NaiveDate) -> NaiveDate {
    (start + Months::new(1)).pred_opt().unwrap()
}

async fn seed_family(db: &DatabaseConnection) {
    families::ActiveModel {
        id: Set(id(DEMO_FAMILY_ID)),
        name: Set("Demo Family".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert family");

    for (member_id, user_id, name) in [
        (PARENT_MEMBER_ID, Some(id(PARENT_USER_ID)), "Parent"),
        (KID_MEMBER_ID, None, "Kid"),
    ] {
        family_members::ActiveModel {
            id: Set(id(member_id)),
            family_id: Set(id(DEMO_FAMILY_ID)),
            user_id: Set(user_id),
            display_name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await
        .expect("Failed to insert family member");
        println!("  Created member: {name}");
    }

    account_books::ActiveModel {
        id: Set(id(DEMO_BOOK_ID)),
        name: Set("Household".to_string()),
        family_id: Set(Some(id(DEMO_FAMILY_ID))),
        period_length: Set(PeriodLength::Monthly),
        refresh_day: Set(1),
        currency: Set("CNY".to_string()),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("Failed to insert account book");
    println!("  Created account book: Household");
}

struct PeriodSeed {
    owner_kind: OwnerKind,
    owner_id: Uuid,
    user_id: Option<Uuid>,
    family_member_id: Option<Uuid>,
    start: NaiveDate,
    base: Decimal,
    rollover: Decimal,
}

async fn seed_periods(db: &DatabaseConnection) {
    let two_back = month_start(2);
    let one_back = month_start(1);

    let seeds = [
        // Kid: consistent chain
        PeriodSeed {
            owner_kind: OwnerKind::CustodialMember,
            owner_id: id(KID_MEMBER_ID),
            user_id: None,
            family_member_id: Some(id(KID_MEMBER_ID)),
            start: two_back,
            base: Decimal::new(500, 0),
            rollover: Decimal::ZERO,
        },
        PeriodSeed {
            owner_kind: OwnerKind::CustodialMember,
            owner_id: id(KID_MEMBER_ID),
            user_id: None,
            family_member_id: Some(id(KID_MEMBER_ID)),
            start: one_back,
            base: Decimal::new(500, 0),
            rollover: Decimal::new(380, 0),
        },
        // Parent: legacy user-path budget, unattributed, with a drifted successor
        PeriodSeed {
            owner_kind: OwnerKind::User,
            owner_id: id(PARENT_USER_ID),
            user_id: Some(id(PARENT_USER_ID)),
            family_member_id: None,
            start: two_back,
            base: Decimal::new(3000, 0),
            rollover: Decimal::ZERO,
        },
        PeriodSeed {
            owner_kind: OwnerKind::FamilyMember,
            owner_id: id(PARENT_MEMBER_ID),
            user_id: Some(id(PARENT_USER_ID)),
            family_member_id: Some(id(PARENT_MEMBER_ID)),
            start: one_back,
            base: Decimal::new(3000, 0),
            rollover: Decimal::new(9999, 0),
        },
    ];

    for seed in seeds {
        let family_id = seed.family_member_id.map(|_| id(DEMO_FAMILY_ID));
        budget_periods::ActiveModel {
            id: Set(Uuid::now_v7()),
            account_book_id: Set(id(DEMO_BOOK_ID)),
            owner_kind: Set(seed.owner_kind),
            owner_id: Set(seed.owner_id),
            user_id: Set(seed.user_id),
            family_id: Set(family_id),
            family_member_id: Set(seed.family_member_id),
            start_date: Set(seed.start),
            end_date: Set(month_end(seed.start)),
            base_amount: Set(seed.base),
            rollover_enabled: Set(true),
            rollover_amount: Set(seed.rollover),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await
        .expect("Failed to insert budget period");
    }
    println!("  Created 4 budget periods");
}

async fn seed_transactions(db: &DatabaseConnection) {
    let two_back = month_start(2);
    let one_back = month_start(1);

    // (user, member, amount, date); user-only rows are legacy and unattributed
    let rows = [
        (None, Some(id(KID_MEMBER_ID)), Decimal::new(120, 0), two_back + chrono::Days::new(3)),
        (Some(id(PARENT_USER_ID)), None, Decimal::new(1850, 0), two_back + chrono::Days::new(9)),
        (Some(id(PARENT_USER_ID)), None, Decimal::new(2240, 0), one_back + chrono::Days::new(4)),
        (None, Some(id(PARENT_MEMBER_ID)), Decimal::new(315, 0), one_back + chrono::Days::new(12)),
        (None, Some(id(KID_MEMBER_ID)), Decimal::new(60, 0), one_back + chrono::Days::new(15)),
    ];

    for (user_id, family_member_id, amount, date) in rows {
        transactions::ActiveModel {
            id: Set(Uuid::now_v7()),
            account_book_id: Set(id(DEMO_BOOK_ID)),
            user_id: Set(user_id),
            family_id: Set(family_member_id.map(|_| id(DEMO_FAMILY_ID))),
            family_member_id: Set(family_member_id),
            budget_id: Set(None),
            transaction_type: Set(TransactionType::Expense),
            amount: Set(amount),
            transaction_date: Set(date),
            description: Set(Some("Seeded expense".to_string())),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await
        .expect("Failed to insert transaction");
    }
    println!("  Created {} transactions", rows.len());
}
