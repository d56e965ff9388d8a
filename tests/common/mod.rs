//! Small synthetic Olist extract shared by the integration tests.
//!
//! Three customers and five orders: c1 has three delivered orders in
//! consecutive months, c2 one delivered order, c3 one canceled order.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use olist_etl::config::AppConfig;

pub const CUSTOMERS: &str = "\
customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state
c1,u1,14409,franca,SP
c2,u2,09790,sao bernardo do campo,SP
c3,u3,01151,sao paulo,SP
";

pub const GEOLOCATION: &str = "\
geolocation_zip_code_prefix,geolocation_lat,geolocation_lng,geolocation_city,geolocation_state
01037,-23.54562128115268,-46.63929204800168,sao paulo,SP
01046,-23.54608112703553,-46.64482029837157,sao paulo,SP
01037,-23.54562128115268,-46.63929204800168,são paulo,SP
";

pub const ORDER_ITEMS: &str = "\
order_id,order_item_id,product_id,seller_id,shipping_limit_date,price,freight_value
o1,1,p1,s1,2017-01-06 10:00:00,50.00,5.00
o1,2,p2,s1,2017-01-06 10:00:00,30.00,5.00
o2,1,p1,s1,2017-02-08 10:00:00,20.00,3.00
o3,1,p2,s2,2017-03-01 10:00:00,40.00,4.00
o4,1,p1,s2,2017-02-15 10:00:00,200.00,10.00
o5,1,p2,s1,2017-02-05 10:00:00,500.00,20.00
";

pub const ORDER_PAYMENTS: &str = "\
order_id,payment_sequential,payment_type,payment_installments,payment_value
o1,1,credit_card,1,60.00
o1,2,voucher,1,30.00
o2,1,boleto,1,23.00
o3,1,credit_card,2,44.00
o4,1,credit_card,3,210.00
o5,1,credit_card,1,520.00
";

pub const ORDER_REVIEWS: &str = "\
review_id,order_id,review_score,review_comment_title,review_comment_message,review_creation_date,review_answer_timestamp
r1,o1,5,,\"Chegou antes do prazo, recomendo\",2017-01-11 00:00:00,2017-01-12 10:00:00
r2,o4,4,Bom,,2017-02-21 00:00:00,2017-02-22 09:30:00
";

pub const ORDERS: &str = "\
order_id,customer_id,order_status,order_purchase_timestamp,order_approved_at,order_delivered_carrier_date,order_delivered_customer_date,order_estimated_delivery_date
o1,c1,delivered,2017-01-02 10:00:00,2017-01-02 11:00:00,2017-01-04 09:00:00,2017-01-10 15:30:00,2017-01-20 00:00:00
o2,c1,delivered,2017-02-03 10:00:00,2017-02-03 11:00:00,2017-02-06 09:00:00,2017-02-12 08:00:00,2017-02-25 00:00:00
o3,c1,delivered,2017-02-25 10:00:00,2017-02-25 11:00:00,2017-02-27 09:00:00,2017-03-05 12:00:00,2017-03-15 00:00:00
o4,c2,delivered,2017-02-10 10:00:00,2017-02-10 11:00:00,2017-02-13 09:00:00,2017-02-20 10:00:00,2017-03-01 00:00:00
o5,c3,canceled,2017-02-01 10:00:00,,,,2017-02-25 00:00:00
";

pub const PRODUCTS: &str = "\
product_id,product_category_name,product_name_lenght,product_description_lenght,product_photos_qty,product_weight_g,product_length_cm,product_height_cm,product_width_cm
p1,perfumaria,40,287,1,225,16,10,14
p2,artes,44,276,1,1000,30,18,20
";

pub const SELLERS: &str = "\
seller_id,seller_zip_code_prefix,seller_city,seller_state
s1,13023,campinas,SP
s2,13844,mogi guacu,SP
";

pub const PRODUCT_CATEGORY_NAME_TRANSLATION: &str = "\
product_category_name,product_category_name_english
perfumaria,perfumery
artes,art
";

/// Write all nine CSV files into `dir`
pub fn write_dataset(dir: &Path) {
    let files = [
        ("olist_customers_dataset.csv", CUSTOMERS),
        ("olist_geolocation_dataset.csv", GEOLOCATION),
        ("olist_order_items_dataset.csv", ORDER_ITEMS),
        ("olist_order_payments_dataset.csv", ORDER_PAYMENTS),
        ("olist_order_reviews_dataset.csv", ORDER_REVIEWS),
        ("olist_orders_dataset.csv", ORDERS),
        ("olist_products_dataset.csv", PRODUCTS),
        ("olist_sellers_dataset.csv", SELLERS),
        ("product_category_name_translation.csv", PRODUCT_CATEGORY_NAME_TRANSLATION),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("Failed to write fixture CSV");
    }
}

/// Configuration pointing at a scratch database and dataset under `root`
pub fn config_for(root: &Path) -> AppConfig {
    let dataset = root.join("dataset");
    fs::create_dir_all(&dataset).expect("Failed to create dataset directory");
    write_dataset(&dataset);

    let mut config = AppConfig::default();
    config.database.path = root.join("olist.db").display().to_string();
    config.dataset.directory = dataset.display().to_string();
    config
}

pub fn approx_eq(got: f64, want: f64) -> bool {
    (got - want).abs() < 1e-9
}
