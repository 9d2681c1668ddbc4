//! # Seed Data Generator
//!
//! Populates a store database with a demo catalog, one promotion and one
//! loyalty customer, then rings up a sample sale.
//!
//! ## Usage
//! ```bash
//! # Uses GROCER_DATABASE_PATH (default ./grocer.db)
//! cargo run -p grocer-db --bin seed
//!
//! # Specify database path
//! cargo run -p grocer-db --bin seed -- --db ./data/store.db
//! ```
//!
//! Other settings (tax rate, policy flags) come from the `GROCER_*`
//! environment variables, see `StoreConfig::from_env`.

use std::env;
use std::path::PathBuf;

use grocer_core::{Cart, Money, PaymentMethod, ProductDraft, PromotionDraft};
use grocer_db::{CheckoutRequest, Database, NewCustomer, SalesService, StoreConfig};

/// (name, price in cents, stock, sku, barcode)
const CATALOG: &[(&str, i64, i64, &str, &str)] = &[
    ("Gala Apples (1 lb)", 249, 120, "PRD-APL-001", "4011000000017"),
    ("Bananas (1 lb)", 69, 200, "PRD-BAN-001", "4011000000024"),
    ("Whole Milk 1L", 199, 60, "DRY-MLK-001", "5901234123457"),
    ("Cheddar Cheese 200g", 449, 40, "DRY-CHD-001", "5901234123464"),
    ("Free-Range Eggs (12)", 389, 48, "DRY-EGG-012", "5901234123471"),
    ("Sourdough Loaf", 599, 15, "BAK-SRD-001", "5901234123488"),
    ("Spaghetti 500g", 179, 80, "GRO-SPG-500", "5901234123495"),
    ("Canned Tomatoes", 129, 90, "GRO-TOM-400", "5901234123501"),
    ("Ground Coffee 250g", 899, 25, "BEV-COF-250", "5901234123518"),
    ("Sparkling Water 6-Pack", 499, 30, "BEV-SPK-006", "5901234123525"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    grocer_db::init_tracing();

    let mut config = StoreConfig::from_env()?;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Grocer POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: $GROCER_DATABASE_PATH)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Grocer POS Seed Data Generator");
    println!("==============================");
    println!("Store:    {}", config.store_name);
    println!("Database: {}", config.database_path.display());
    println!("Tax rate: {}%", config.tax_rate.percentage());
    println!();

    let db = Database::new(config.db_config()).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    let mut products = Vec::with_capacity(CATALOG.len());
    for (name, cents, stock, sku, barcode) in CATALOG {
        let draft = ProductDraft::new(*name, Money::from_cents(*cents))
            .quantity(*stock)
            .reorder_level(10)
            .sku(*sku)
            .barcode(*barcode);
        match db.products().insert(draft).await {
            Ok(product) => products.push(product),
            Err(e) => eprintln!("Failed to insert {}: {}", sku, e),
        }
    }
    println!("✓ Inserted {} products", products.len());

    let promo = db
        .promotions()
        .insert(
            &PromotionDraft::percentage("Weekend 10% Off", "10")?
                .min_purchase(Money::from_cents(2000)),
        )
        .await?;
    println!("✓ Promotion #{}: {}", promo.id, promo.name);

    let customer = db
        .customers()
        .insert(&NewCustomer::new("Demo Customer").loyalty_points(25))
        .await?;
    println!("✓ Customer #{}: {} ({} points)", customer.id, customer.name, customer.loyalty_points);

    let service = SalesService::from_config(db.clone(), &config);

    let mut cart = Cart::new();
    for token in ["PRD-APL-001", "DRY-MLK-001", "BEV-COF-250", "sourdough"] {
        let product = service.lookup_product(token).await?;
        cart.add_product(&product, 2)?;
    }

    let receipt = service
        .checkout(
            CheckoutRequest::new(1, &cart, PaymentMethod::Card)
                .customer(customer.id)
                .promotion(promo.id)
                .redeem_points(5),
        )
        .await?;

    println!();
    println!("Sample sale #{}", receipt.sale.id);
    for item in &receipt.items {
        println!(
            "  product {} × {} @ {} = {}",
            item.product_id,
            item.quantity,
            Money::from_cents(item.unit_price_cents),
            item.subtotal()
        );
    }
    println!("  subtotal {}", receipt.sale.subtotal());
    println!("  discount {}", receipt.sale.discount());
    println!("  tax      {}", receipt.sale.tax());
    println!("  total    {}", receipt.sale.total());

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}
