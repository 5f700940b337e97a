use fooddala_catalog::Bill;
use fooddala_store::Cart;
use std::fmt::Write;

/// Plain-text cart and bill breakdown, as shown beside the checkout button.
pub fn render_cart(cart: &Cart, bill: &Bill) -> String {
    let mut out = String::new();
    if let Some(restaurant) = &cart.restaurant {
        let _ = writeln!(out, "{}", restaurant.name);
    }
    for item in &cart.items {
        let name = if item.customizations.is_empty() {
            item.name.clone()
        } else {
            format!("{} ({})", item.name, item.customizations.join(", "))
        };
        let _ = writeln!(out, "  {:>2} x {:<32} {:>10}", item.quantity, name, item.line_total().to_string());
    }

    let _ = writeln!(out, "{:<39} {:>10}", "Subtotal", bill.subtotal.to_string());
    let _ = writeln!(out, "{:<39} {:>10}", "Delivery fee", bill.delivery_fee.to_string());
    let _ = writeln!(out, "{:<39} {:>10}", "Taxes", bill.tax.to_string());
    if let Some(code) = &bill.coupon_code {
        let _ = writeln!(out, "{:<39} {:>10}", format!("Discount ({})", code), format!("-{}", bill.discount));
    }
    let _ = write!(out, "{:<39} {:>10}", "Total", bill.total.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fooddala_catalog::{BillingEngine, RestaurantRef};
    use fooddala_shared::Money;
    use fooddala_store::CartItem;

    #[test]
    fn test_render_cart() {
        let cart = Cart {
            restaurant: Some(RestaurantRef::new("r-1", "Udupi Grand")),
            items: vec![
                CartItem::new("dosa-1", "Masala Dosa", Money::from_rupees(90), 2)
                    .with_customizations(vec!["Extra chutney".to_string()]),
                CartItem::new("coffee-1", "Filter Coffee", Money::from_rupees(40), 1),
            ],
        };
        let billing = BillingEngine::default();
        let coupon = billing.lookup_coupon("FLAT50").unwrap();
        let bill = billing.bill(cart.total(), cart.restaurant.as_ref(), Some(&coupon));

        let text = render_cart(&cart, &bill);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Udupi Grand");
        assert!(lines[1].contains("2 x Masala Dosa (Extra chutney)"));
        assert!(lines[1].ends_with("180.00"));
        assert!(text.contains("Discount (FLAT50)"));
        assert!(lines.last().unwrap().starts_with("Total"));
        assert!(lines.last().unwrap().ends_with("221.00"));
    }
}
