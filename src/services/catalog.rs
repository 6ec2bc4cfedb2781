//! Product catalog
//!
//! In-memory catalog of veterinary products with the lookup operations the
//! agent and the REST API need. Lookups are pure and synchronous; price and
//! stock formatting lives here so every consumer sees the same shape.

use serde::Serialize;

/// A catalog entry as stored
#[derive(Debug, Clone)]
pub struct Product {
    pub id: u32,
    pub descricao: String,
    /// Unit price in BRL
    pub preco: f64,
    pub estoque: i64,
}

/// A catalog entry as exposed by the API and the stock tool
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: u32,
    pub descricao: String,
    pub preco: f64,
    /// Price formatted as Brazilian currency, e.g. "R$ 112,00"
    pub preco_formatado: String,
    pub estoque: i64,
    pub disponivel: bool,
    /// Coarse label: Indisponivel / Estoque baixo / Estoque moderado / Em estoque
    pub status_estoque: String,
}

/// In-memory product catalog, seeded at startup
pub struct ProductCatalog {
    produtos: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(mut produtos: Vec<Product>) -> Self {
        produtos.sort_by(|a, b| a.descricao.to_lowercase().cmp(&b.descricao.to_lowercase()));
        Self { produtos }
    }

    /// Catalog used when no external data source is configured
    pub fn with_seed_data() -> Self {
        Self::new(vec![
            Product {
                id: 1,
                descricao: "Apoquel 16mg 20 comprimidos".to_string(),
                preco: 112.00,
                estoque: 30,
            },
            Product {
                id: 2,
                descricao: "Amoxicilina 250mg suspensao oral".to_string(),
                preco: 48.90,
                estoque: 12,
            },
            Product {
                id: 3,
                descricao: "Simparic 40mg 3 comprimidos".to_string(),
                preco: 189.50,
                estoque: 8,
            },
            Product {
                id: 4,
                descricao: "Bravecto 500mg caes 10-20kg".to_string(),
                preco: 259.90,
                estoque: 0,
            },
            Product {
                id: 5,
                descricao: "Drontal Plus vermifugo 4 comprimidos".to_string(),
                preco: 52.30,
                estoque: 75,
            },
            Product {
                id: 6,
                descricao: "Dipirona gotas 500mg/ml 10ml".to_string(),
                preco: 19.90,
                estoque: 44,
            },
        ])
    }

    /// All products, ordered by description
    pub fn find_all(&self) -> Vec<ProductView> {
        self.produtos.iter().map(format_product).collect()
    }

    pub fn find_by_id(&self, id: u32) -> Option<ProductView> {
        self.produtos
            .iter()
            .find(|p| p.id == id)
            .map(format_product)
    }

    /// Case-insensitive partial match on the description
    pub fn find_by_term(&self, termo: &str) -> Vec<ProductView> {
        let needle = termo.to_lowercase();
        self.produtos
            .iter()
            .filter(|p| p.descricao.to_lowercase().contains(&needle))
            .map(format_product)
            .collect()
    }

    /// First product matching the term, for the agent's stock tool
    pub fn find_first_by_term(&self, termo: &str) -> Option<ProductView> {
        self.find_by_term(termo).into_iter().next()
    }
}

fn format_product(produto: &Product) -> ProductView {
    ProductView {
        id: produto.id,
        descricao: produto.descricao.clone(),
        preco: produto.preco,
        preco_formatado: format_price(produto.preco),
        estoque: produto.estoque,
        disponivel: produto.estoque > 0,
        status_estoque: stock_status(produto.estoque).to_string(),
    }
}

/// "R$ 112,00", comma as the decimal separator
fn format_price(preco: f64) -> String {
    let cents = (preco * 100.0).round() as i64;
    format!("R$ {},{:02}", cents / 100, cents % 100)
}

fn stock_status(quantidade: i64) -> &'static str {
    if quantidade == 0 {
        "Indisponivel"
    } else if quantidade <= 10 {
        "Estoque baixo"
    } else if quantidade <= 50 {
        "Estoque moderado"
    } else {
        "Em estoque"
    }
}
