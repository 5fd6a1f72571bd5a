// Catalog store and render layer.
// The catalog is loaded once and never mutated; views are recomputed from it on every filter change.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorefrontError};
use crate::types::*;

/// In-memory product catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Load a catalog, rejecting zero prices and duplicate ids.
    pub fn new(products: Vec<Product>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(products.len());
        for product in &products {
            if product.price.amount() == 0 {
                return Err(StorefrontError::InvalidConfig(format!(
                    "product {} has a zero price",
                    product.id
                )));
            }
            if !seen.insert(product.id) {
                return Err(StorefrontError::InvalidConfig(format!(
                    "duplicate product id {}",
                    product.id
                )));
            }
        }
        Ok(Catalog { products })
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn first(&self) -> Option<&Product> {
        self.products.first()
    }

    pub fn get(&self, id: ProductId) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or(StorefrontError::UnknownProduct(id))
    }

    /// Apply the search box and sort control. An empty query matches everything;
    /// no sort mode keeps catalog order.
    pub fn view(&self, filter: &CatalogFilter) -> Vec<&Product> {
        let query = filter.query.trim().to_lowercase();
        let mut list: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| {
                query.is_empty()
                    || p.title.to_lowercase().contains(&query)
                    || p.seller.to_lowercase().contains(&query)
            })
            .collect();

        match filter.sort {
            Some(SortMode::PriceAsc) => list.sort_by_key(|p| p.price),
            Some(SortMode::New) => list.sort_by(|a, b| b.id.cmp(&a.id)),
            Some(SortMode::Popular) => list.sort_by(|a, b| b.popularity.cmp(&a.popularity)),
            None => {}
        }

        list
    }
}

/// Current state of the search box and sort control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFilter {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub sort: Option<SortMode>,
}

/// View-model for one product card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCard {
    pub id: ProductId,
    pub title: String,
    pub seller: String,
    pub price_label: String,
    pub image: String,
}

impl ProductCard {
    pub fn from_product(product: &Product, currency: &str) -> Self {
        ProductCard {
            id: product.id,
            title: product.title.clone(),
            seller: product.seller.clone(),
            price_label: format_price(currency, product.price.as_f64()),
            image: product.image.clone(),
        }
    }

    /// Render the card as an HTML fragment. All text is escaped.
    pub fn to_html(&self) -> String {
        let id = self.id.as_u32();
        format!(
            concat!(
                "<article class=\"product-card\">",
                "<img src=\"{image}\" alt=\"{title}\">",
                "<div class=\"product-title\">{title}</div>",
                "<div class=\"muted\">by {seller}</div>",
                "<div class=\"price\">{price}</div>",
                "<div class=\"card-actions\">",
                "<button class=\"btn\" data-buy=\"{id}\">Buy</button>",
                "<button class=\"btn\" data-negotiate=\"{id}\">Negotiate</button>",
                "<button class=\"btn\" data-preview=\"{id}\">Preview</button>",
                "</div></article>"
            ),
            image = escape_html(&self.image),
            title = escape_html(&self.title),
            seller = escape_html(&self.seller),
            price = escape_html(&self.price_label),
            id = id,
        )
    }
}

/// Render the filtered catalog into card view-models.
pub fn render_cards(catalog: &Catalog, filter: &CatalogFilter, currency: &str) -> Vec<ProductCard> {
    catalog
        .view(filter)
        .into_iter()
        .map(|p| ProductCard::from_product(p, currency))
        .collect()
}

/// Whole-unit amounts print without decimals.
pub fn format_price(currency: &str, amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}{:.0}", currency, amount)
    } else {
        format!("{}{:.2}", currency, amount)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> Catalog {
        Catalog::new(StorefrontConfig::default().catalog).unwrap()
    }

    fn ids(list: &[&Product]) -> Vec<u32> {
        list.iter().map(|p| p.id.as_u32()).collect()
    }

    #[test]
    fn search_matches_title_and_seller() {
        let catalog = demo();
        let filter = CatalogFilter {
            query: "  MANGO ".to_string(),
            sort: None,
        };
        assert_eq!(ids(&catalog.view(&filter)), vec![1, 3]);

        let filter = CatalogFilter {
            query: "handloom".to_string(),
            sort: None,
        };
        assert_eq!(ids(&catalog.view(&filter)), vec![2]);
    }

    #[test]
    fn sort_modes() {
        let catalog = demo();
        let mut filter = CatalogFilter::default();
        assert_eq!(ids(&catalog.view(&filter)), vec![1, 2, 3]);

        filter.sort = Some(SortMode::PriceAsc);
        assert_eq!(ids(&catalog.view(&filter)), vec![2, 3, 1]);

        filter.sort = Some(SortMode::New);
        assert_eq!(ids(&catalog.view(&filter)), vec![3, 2, 1]);

        filter.sort = Some(SortMode::Popular);
        assert_eq!(ids(&catalog.view(&filter)), vec![2, 3, 1]);
    }

    #[test]
    fn rejects_bad_catalogs() {
        let mut products = StorefrontConfig::default().catalog;
        products[1].id = ProductId::new(1);
        assert!(matches!(
            Catalog::new(products),
            Err(StorefrontError::InvalidConfig(_))
        ));

        let mut products = StorefrontConfig::default().catalog;
        products[0].price = Price::new(0);
        assert!(Catalog::new(products).is_err());
    }

    #[test]
    fn unknown_product_lookup() {
        let catalog = demo();
        assert!(matches!(
            catalog.get(ProductId::new(99)),
            Err(StorefrontError::UnknownProduct(_))
        ));
    }

    #[test]
    fn card_html_is_escaped() {
        let product = Product {
            id: ProductId::new(7),
            title: "<script>alert(1)</script>".to_string(),
            price: Price::new(500),
            seller: "Tom & Co".to_string(),
            popularity: 0,
            image: "x\" onerror=\"y".to_string(),
        };
        let html = ProductCard::from_product(&product, "₹").to_html();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Tom &amp; Co"));
        assert!(html.contains("x&quot; onerror"));
        assert!(html.contains("₹500"));
        assert!(html.contains("data-negotiate=\"7\""));
    }

    #[test]
    fn price_formatting() {
        assert_eq!(format_price("₹", 990.0), "₹990");
        assert_eq!(format_price("₹", 990.5), "₹990.50");
        assert_eq!(format_price("₹", 1e20), "₹100000000000000000000");
    }
}
