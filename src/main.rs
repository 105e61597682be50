use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::EnvFilter;

use invoicer::config::{
    config_dir, load_clients, load_config, load_products, load_state, save_clients, save_state,
    Client, HistoryEntry, Product, CLIENTS_TEMPLATE, CONFIG_TEMPLATE, PRODUCTS_TEMPLATE,
};
use invoicer::error::{InvoiceError, LineField, Result};
use invoicer::invoice::{Invoice, InvoiceLine, InvoiceStatus, InvoiceTotals, LineTotals};
use invoicer::plan::{check_quota, evaluate, Feature, Limit, PlanTier, ResourceType};

#[derive(Parser)]
#[command(name = "invoicer")]
#[command(version, about = "Invoice totals, numbering and plan limits", long_about = None)]
struct Cli {
    /// Path to config directory (default: platform config dir or ~/.invoicer)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log debug details to stderr (overridden by INVOICER_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with template files
    Init,

    /// List configured clients
    Clients,

    /// Add a client (counts against the plan's client limit)
    AddClient {
        /// Identifier used with --client
        id: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        tax_id: Option<String>,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        zip: Option<String>,

        #[arg(long)]
        country: Option<String>,
    },

    /// List available products and services
    Products,

    /// Show company, plan and next invoice number
    Status,

    /// Show plan usage against its limits
    Usage {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute totals for line items without issuing an invoice
    Quote {
        /// Line items in format "product:quantity" (can be repeated)
        #[arg(short, long, value_name = "PRODUCT:QTY")]
        item: Vec<String>,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Issue a new draft invoice
    Issue {
        /// Client identifier from clients.toml
        #[arg(short, long)]
        client: String,

        /// Line items in format "product:quantity" (can be repeated)
        #[arg(short, long, value_name = "PRODUCT:QTY")]
        item: Vec<String>,

        /// Invoice date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Free-form notes stored with the invoice
        #[arg(long)]
        notes: Option<String>,
    },

    /// List issued invoices
    List {
        /// Only show invoices with this status (draft, sent, paid, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Number of invoices to show (default: all)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show an invoice with its lines and totals
    Show {
        /// Invoice number or index from 'list' (e.g., 1 or 2026-0001)
        invoice: String,
    },

    /// Replace an invoice's line items
    Edit {
        /// Invoice number or index from 'list' (e.g., 1 or 2026-0001)
        invoice: String,

        /// New line items in format "product:quantity" (replaces existing items)
        #[arg(short, long, value_name = "PRODUCT:QTY")]
        item: Vec<String>,
    },

    /// Change an invoice's status
    SetStatus {
        /// Invoice number or index from 'list' (e.g., 1 or 2026-0001)
        invoice: String,

        /// New status: draft, sent, paid or cancelled
        status: String,
    },

    /// Delete an invoice (its number is never reused)
    Delete {
        /// Invoice number or index from 'list' (e.g., 1 or 2026-0001)
        invoice: String,
    },

    /// Totals by status (requires the analytics feature)
    Summary,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("INVOICER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };
    tracing::debug!(config_dir = %cfg_dir.display(), "resolved config directory");

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Clients => cmd_clients(&cfg_dir),
        Commands::AddClient {
            id,
            name,
            email,
            tax_id,
            address,
            city,
            zip,
            country,
        } => {
            let client = Client {
                name,
                tax_id,
                email,
                address,
                city,
                zip,
                country,
            };
            cmd_add_client(&cfg_dir, &id, client)
        }
        Commands::Products => cmd_products(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::Usage { json } => cmd_usage(&cfg_dir, json),
        Commands::Quote { item, json } => cmd_quote(&cfg_dir, &item, json),
        Commands::Issue {
            client,
            item,
            date,
            notes,
        } => cmd_issue(&cfg_dir, &client, &item, date.as_deref(), notes),
        Commands::List { status, limit } => cmd_list(&cfg_dir, status.as_deref(), limit),
        Commands::Show { invoice } => cmd_show(&cfg_dir, &invoice),
        Commands::Edit { invoice, item } => cmd_edit(&cfg_dir, &invoice, &item),
        Commands::SetStatus { invoice, status } => cmd_set_status(&cfg_dir, &invoice, &status),
        Commands::Delete { invoice } => cmd_delete(&cfg_dir, &invoice),
        Commands::Summary => cmd_summary(&cfg_dir),
    }
}

fn ensure_initialized(cfg_dir: &Path) -> Result<()> {
    if !cfg_dir.exists() {
        return Err(InvoiceError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(InvoiceError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;
    fs::write(cfg_dir.join("clients.toml"), CLIENTS_TEMPLATE)?;
    fs::write(cfg_dir.join("products.toml"), PRODUCTS_TEMPLATE)?;

    println!("Initialized invoicer config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit your company profile:  $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!(
        "  2. Add your clients:           $EDITOR {}/clients.toml",
        cfg_dir.display()
    );
    println!(
        "  3. Configure products:         $EDITOR {}/products.toml",
        cfg_dir.display()
    );
    println!();
    println!("Then issue your first invoice:");
    println!("  invoicer issue --client <client-id> --item <product>:<quantity>");

    Ok(())
}

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "EMAIL")]
    email: String,
}

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
    #[tabled(rename = "PRICE")]
    price: String,
    #[tabled(rename = "TAX %")]
    tax_rate: String,
}

#[derive(Tabled)]
struct InvoiceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "CLIENT")]
    client: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct LineRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "DESCRIPTION")]
    description: String,
    #[tabled(rename = "QTY")]
    quantity: String,
    #[tabled(rename = "PRICE")]
    unit_price: String,
    #[tabled(rename = "TAX %")]
    tax_rate: String,
    #[tabled(rename = "SUBTOTAL")]
    subtotal: String,
    #[tabled(rename = "TAX")]
    tax: String,
    #[tabled(rename = "TOTAL")]
    total: String,
}

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "RESOURCE")]
    resource: String,
    #[tabled(rename = "USED")]
    used: u64,
    #[tabled(rename = "LIMIT")]
    limit: String,
    #[tabled(rename = "%")]
    percent: String,
    #[tabled(rename = "STATE")]
    state: String,
}

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "INVOICES")]
    count: usize,
    #[tabled(rename = "TOTAL")]
    total: String,
}

/// Group the whole part of an amount with thousands separators, keeping two
/// decimals: 1234.5 -> "1,234.50"
fn format_amount(value: Decimal) -> String {
    let rounded = format!("{:.2}", value);
    let (whole, frac) = rounded.split_once('.').unwrap_or((rounded.as_str(), "00"));
    let (sign, digits) = match whole.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", whole),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{frac}")
}

fn format_money(value: Decimal, currency_symbol: &str) -> String {
    format!("{}{}", currency_symbol, format_amount(value))
}

/// Parse item input like "consulting:8" into (product_id, quantity)
fn parse_item_input(input: &str) -> Result<(&str, Decimal)> {
    let (product_id, qty_str) = input
        .split_once(':')
        .filter(|(id, qty)| !id.is_empty() && !qty.contains(':'))
        .ok_or_else(|| InvoiceError::InvalidItemFormat(input.to_string()))?;

    let quantity = Decimal::from_str(qty_str.trim()).map_err(|_| InvoiceError::InvalidLineInput {
        field: LineField::Quantity,
        value: qty_str.to_string(),
        reason: format!("must be a number (item '{product_id}')"),
    })?;

    Ok((product_id, quantity))
}

/// Resolve item inputs against the product catalog
fn build_lines(
    items_input: &[String],
    products: &BTreeMap<String, Product>,
    default_tax_rate: Decimal,
) -> Result<Vec<InvoiceLine>> {
    if items_input.is_empty() {
        return Err(InvoiceError::NoItems);
    }

    items_input
        .iter()
        .map(|input| -> Result<InvoiceLine> {
            let (product_id, quantity) = parse_item_input(input)?;
            let product = products
                .get(product_id)
                .ok_or_else(|| InvoiceError::ProductNotFound(product_id.to_string()))?;

            Ok(InvoiceLine::new(
                product.description.clone(),
                quantity,
                product.unit_price,
                product.tax_rate.unwrap_or(default_tax_rate),
            )
            .with_product(product_id))
        })
        .collect()
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| InvoiceError::InvalidDate(input.to_string()))
}

/// Resolve an invoice reference to the actual invoice number.
/// Accepts either the full invoice number or an index (1-based) from 'list'.
/// An exact number match wins, so all-digit numbers like "3" stay reachable.
fn resolve_invoice_number(history: &[HistoryEntry], reference: &str) -> Result<String> {
    if history.iter().any(|e| e.number == reference) {
        return Ok(reference.to_string());
    }

    match reference.parse::<usize>() {
        // Invoices are displayed newest first
        Ok(idx) if idx == 0 || idx > history.len() => {
            Err(InvoiceError::InvalidInvoiceIndex(reference.to_string()))
        }
        Ok(idx) => Ok(history[history.len() - idx].number.clone()),
        Err(_) => Err(InvoiceError::InvoiceNotFound(reference.to_string())),
    }
}

/// List configured clients
fn cmd_clients(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;

    if clients.is_empty() {
        println!("No clients configured.");
        println!("Add clients to: {}/clients.toml", cfg_dir.display());
        return Ok(());
    }

    let rows: Vec<ClientRow> = clients
        .iter()
        .map(|(id, client)| ClientRow {
            id: id.clone(),
            name: client.name.clone(),
            email: client.email.clone(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

fn cmd_add_client(cfg_dir: &Path, id: &str, client: Client) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let mut clients = load_clients(cfg_dir)?;

    if clients.contains_key(id) {
        return Err(InvoiceError::ClientExists(id.to_string()));
    }

    let tier = config.plan.tier()?;
    let usage = check_quota(tier, ResourceType::Clients, clients.len() as u64)?;

    let name = client.name.clone();
    clients.insert(id.to_string(), client);
    save_clients(cfg_dir, &clients)?;

    println!("Added client '{}' ({})", id, name);
    if let Some(remaining) = usage.remaining() {
        println!(
            "  {} of {} clients used on the {} plan",
            usage.current + 1,
            usage.limit,
            tier
        );
        if remaining <= 1 {
            println!("  This was the last client your plan allows.");
        }
    }

    Ok(())
}

/// List available products
fn cmd_products(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let products = load_products(cfg_dir)?;

    if products.is_empty() {
        println!("No products configured.");
        println!("Add products to: {}/products.toml", cfg_dir.display());
        return Ok(());
    }

    let symbol = &config.invoice.currency_symbol;
    let rows: Vec<ProductRow> = products
        .iter()
        .map(|(id, product)| ProductRow {
            id: id.clone(),
            description: product.description.clone(),
            price: match &product.unit {
                Some(unit) => format!("{}/{}", format_money(product.unit_price, symbol), unit),
                None => format_money(product.unit_price, symbol),
            },
            tax_rate: product
                .tax_rate
                .unwrap_or(config.invoice.default_tax_rate)
                .normalize()
                .to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

/// Show company, plan and numbering status
fn cmd_status(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let products = load_products(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let tier = config.plan.tier()?;

    let next_number = state.numbering(&config.numbering).peek(today().year())?;
    let invoice_usage = evaluate(
        tier,
        ResourceType::InvoicesPerMonth,
        state.invoices_in_month(today()),
    );

    println!("Invoice Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Company:          {} ({})", config.company.name, config.company.tax_id);
    println!("Plan:             {}", tier);
    println!("Clients:          {}", clients.len());
    println!("Products:         {}", products.len());
    println!(
        "This month:       {} of {} invoices",
        invoice_usage.current, invoice_usage.limit
    );
    println!("Next invoice:     {}", next_number);

    if !state.history.is_empty() {
        println!();
        println!("Recent invoices:");
        for entry in state.history.iter().rev().take(5) {
            let totals = entry.totals()?;
            println!(
                "  {} - {} - {} - {}",
                entry.number,
                entry.client,
                format_money(totals.total, &config.invoice.currency_symbol),
                entry.invoice.status
            );
        }
    }

    Ok(())
}

fn cmd_usage(cfg_dir: &Path, json: bool) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let tier = config.plan.tier()?;

    let usage: Vec<_> = ResourceType::ALL
        .iter()
        .map(|&resource| {
            let current = match resource {
                ResourceType::Clients => clients.len() as u64,
                ResourceType::InvoicesPerMonth => state.invoices_in_month(today()),
            };
            evaluate(tier, resource, current)
        })
        .collect();

    if json {
        let out = serde_json::to_string_pretty(&usage)
            .map_err(|e| InvoiceError::Serialize("usage".to_string(), e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let rows: Vec<UsageRow> = usage
        .iter()
        .map(|u| UsageRow {
            resource: u.resource.to_string(),
            used: u.current,
            limit: u.limit.to_string(),
            percent: match u.limit {
                Limit::Unlimited => "-".to_string(),
                Limit::Max(_) => format!("{}%", u.percent_used),
            },
            state: if u.at_limit {
                "AT LIMIT".to_string()
            } else if u.near_limit {
                "NEAR LIMIT".to_string()
            } else {
                "OK".to_string()
            },
        })
        .collect();

    println!("Plan: {}", tier);
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    if usage.iter().any(|u| u.at_limit) && tier != PlanTier::Pro {
        println!("Upgrade your plan to raise these limits.");
    }

    Ok(())
}

#[derive(Serialize)]
struct QuoteLine<'a> {
    #[serde(flatten)]
    line: &'a InvoiceLine,
    #[serde(flatten)]
    totals: LineTotals,
}

#[derive(Serialize)]
struct Quote<'a> {
    lines: Vec<QuoteLine<'a>>,
    #[serde(flatten)]
    totals: InvoiceTotals,
}

fn line_rows(lines: &[InvoiceLine], currency_symbol: &str) -> Result<Vec<LineRow>> {
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| -> Result<LineRow> {
            let totals = line.totals()?;
            Ok(LineRow {
                index: idx + 1,
                description: line.description.clone(),
                quantity: line.quantity.normalize().to_string(),
                unit_price: format_money(line.unit_price, currency_symbol),
                tax_rate: line.tax_rate_percent.normalize().to_string(),
                subtotal: format_money(totals.subtotal, currency_symbol),
                tax: format_money(totals.tax, currency_symbol),
                total: format_money(totals.total, currency_symbol),
            })
        })
        .collect()
}

fn print_totals(totals: &InvoiceTotals, currency_symbol: &str) {
    println!("  Subtotal: {}", format_money(totals.subtotal, currency_symbol));
    println!("  Tax:      {}", format_money(totals.total_tax, currency_symbol));
    println!("  Total:    {}", format_money(totals.total, currency_symbol));
}

/// Compute totals for line items without touching state
fn cmd_quote(cfg_dir: &Path, items_input: &[String], json: bool) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let products = load_products(cfg_dir)?;

    let lines = build_lines(items_input, &products, config.invoice.default_tax_rate)?;
    let invoice = Invoice::with_lines(lines);
    let totals = invoice.totals()?;

    if json {
        let quote = Quote {
            lines: invoice
                .lines
                .iter()
                .map(|line| line.totals().map(|totals| QuoteLine { line, totals }))
                .collect::<Result<Vec<_>>>()?,
            totals,
        };
        let out = serde_json::to_string_pretty(&quote)
            .map_err(|e| InvoiceError::Serialize("quote".to_string(), e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    let symbol = &config.invoice.currency_symbol;
    let table = Table::new(line_rows(&invoice.lines, symbol)?)
        .with(Style::rounded())
        .to_string();
    println!("{table}");
    print_totals(&totals, symbol);

    Ok(())
}

/// Issue a new draft invoice
fn cmd_issue(
    cfg_dir: &Path,
    client_id: &str,
    items_input: &[String],
    date: Option<&str>,
    notes: Option<String>,
) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let products = load_products(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;
    let tier = config.plan.tier()?;

    // Quota follows the day of issue, not the (possibly back-dated) invoice date
    let issued_on = today();
    check_quota(
        tier,
        ResourceType::InvoicesPerMonth,
        state.invoices_in_month(issued_on),
    )?;

    let client = clients
        .get(client_id)
        .ok_or_else(|| InvoiceError::ClientNotFound(client_id.to_string()))?;

    let mut invoice = Invoice::new();
    invoice.replace_lines(build_lines(
        items_input,
        &products,
        config.invoice.default_tax_rate,
    )?)?;
    let totals = invoice.totals()?;
    let status = invoice.status;

    let date = match date {
        Some(d) => parse_date(d)?,
        None => issued_on,
    };

    let (number, advanced) = state.numbering(&config.numbering).issue(date.year())?;

    state.record_issue(
        HistoryEntry {
            number: number.clone(),
            client: client_id.to_string(),
            date,
            issued_on: Some(issued_on),
            notes,
            invoice,
        },
        &advanced,
    );
    save_state(cfg_dir, &state)?;

    tracing::info!(number = %number, client = client_id, total = %totals.total, "issued invoice");

    println!("Issued {} ({})", number, status);
    println!("  Client:   {}", client.name);
    print_totals(&totals, &config.invoice.currency_symbol);

    Ok(())
}

/// List issued invoices, newest first
fn cmd_list(cfg_dir: &Path, status: Option<&str>, limit: Option<usize>) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let state = load_state(cfg_dir)?;
    let status_filter = status.map(InvoiceStatus::from_str).transpose()?;

    if state.history.is_empty() {
        println!("No invoices issued yet.");
        return Ok(());
    }

    let symbol = &config.invoice.currency_symbol;
    let mut rows = Vec::new();
    let mut shown_total = Decimal::ZERO;
    for (idx, entry) in state.history.iter().rev().enumerate() {
        if status_filter.is_some_and(|s| s != entry.invoice.status) {
            continue;
        }
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        let totals = entry.totals()?;
        if entry.invoice.status != InvoiceStatus::Cancelled {
            shown_total += totals.total;
        }
        rows.push(InvoiceRow {
            index: idx + 1,
            number: entry.number.clone(),
            date: entry.date.to_string(),
            client: entry.client.clone(),
            total: format_money(totals.total, symbol),
            status: entry.invoice.status.to_string(),
        });
    }

    if rows.is_empty() {
        println!("No invoices match the given filters.");
        return Ok(());
    }

    let shown = rows.len();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
    println!();
    println!(
        "Showing {} of {} invoices, {} invoiced (excluding cancelled)",
        shown,
        state.history.len(),
        format_money(shown_total, symbol)
    );
    println!("Use index number with show/edit/set-status/delete (e.g., 'invoicer show 1')");

    Ok(())
}

/// Show a single invoice
fn cmd_show(cfg_dir: &Path, invoice_ref: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let clients = load_clients(cfg_dir)?;
    let state = load_state(cfg_dir)?;

    let invoice_number = resolve_invoice_number(&state.history, invoice_ref)?;
    let entry = state
        .find(&invoice_number)
        .ok_or_else(|| InvoiceError::InvoiceNotFound(invoice_number.clone()))?;
    let totals = entry.totals()?;
    let symbol = &config.invoice.currency_symbol;

    let client_name = clients
        .get(&entry.client)
        .map(|c| c.name.as_str())
        .unwrap_or(entry.client.as_str());

    println!("Invoice {} ({})", entry.number, entry.invoice.status);
    println!("  From:   {} ({})", config.company.name, config.company.tax_id);
    println!("  To:     {}", client_name);
    println!("  Date:   {}", entry.date.format("%B %d, %Y"));
    if let Some(notes) = &entry.notes {
        println!("  Notes:  {}", notes);
    }

    if entry.invoice.lines.is_empty() {
        println!("  No lines.");
    } else {
        let table = Table::new(line_rows(&entry.invoice.lines, symbol)?)
            .with(Style::rounded())
            .to_string();
        println!("{table}");
    }
    print_totals(&totals, symbol);

    if let Some(terms) = &config.company.payment_terms {
        println!("  Terms:    {}", terms);
    }

    Ok(())
}

/// Replace the lines of an existing invoice
fn cmd_edit(cfg_dir: &Path, invoice_ref: &str, items_input: &[String]) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    let products = load_products(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;

    let invoice_number = resolve_invoice_number(&state.history, invoice_ref)?;
    let lines = build_lines(items_input, &products, config.invoice.default_tax_rate)?;

    let entry = state
        .find_mut(&invoice_number)
        .ok_or_else(|| InvoiceError::InvoiceNotFound(invoice_number.clone()))?;

    // Status is untouched; only the line set is swapped
    entry.invoice.replace_lines(lines)?;
    let totals = entry.invoice.totals()?;

    save_state(cfg_dir, &state)?;

    println!("Updated {}", invoice_number);
    println!("  Items:    {}", items_input.join(", "));
    print_totals(&totals, &config.invoice.currency_symbol);

    Ok(())
}

fn cmd_set_status(cfg_dir: &Path, invoice_ref: &str, status: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let status: InvoiceStatus = status.parse()?;
    let mut state = load_state(cfg_dir)?;

    let invoice_number = resolve_invoice_number(&state.history, invoice_ref)?;
    let entry = state
        .find_mut(&invoice_number)
        .ok_or_else(|| InvoiceError::InvoiceNotFound(invoice_number.clone()))?;

    let previous = entry.invoice.status;
    entry.invoice.set_status(status);
    save_state(cfg_dir, &state)?;

    tracing::info!(number = %invoice_number, from = %previous, to = %status, "changed invoice status");
    println!("Marked {} as {}", invoice_number, status);

    Ok(())
}

fn cmd_delete(cfg_dir: &Path, invoice_ref: &str) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let mut state = load_state(cfg_dir)?;

    let invoice_number = resolve_invoice_number(&state.history, invoice_ref)?;
    state
        .remove(&invoice_number)
        .ok_or_else(|| InvoiceError::InvoiceNotFound(invoice_number.clone()))?;
    save_state(cfg_dir, &state)?;

    println!("Deleted {} (its number will not be reused)", invoice_number);

    Ok(())
}

/// Totals grouped by status
fn cmd_summary(cfg_dir: &Path) -> Result<()> {
    ensure_initialized(cfg_dir)?;
    let config = load_config(cfg_dir)?;
    config.plan.tier()?.require_feature(Feature::Analytics)?;
    let state = load_state(cfg_dir)?;

    let mut by_status: Vec<(InvoiceStatus, usize, Decimal)> = Vec::new();
    for entry in &state.history {
        let total = entry.totals()?.total;
        let status = entry.invoice.status;
        match by_status.iter_mut().find(|(s, _, _)| *s == status) {
            Some((_, count, sum)) => {
                *count += 1;
                *sum += total;
            }
            None => by_status.push((status, 1, total)),
        }
    }

    if by_status.is_empty() {
        println!("No invoices issued yet.");
        return Ok(());
    }

    let symbol = &config.invoice.currency_symbol;
    let rows: Vec<SummaryRow> = by_status
        .into_iter()
        .map(|(status, count, total)| SummaryRow {
            status: status.to_string(),
            count,
            total: format_money(total, symbol),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_amounts_with_grouping() {
        assert_eq!(format_amount(Decimal::new(123456789, 2)), "1,234,567.89");
        assert_eq!(format_amount(Decimal::new(3630, 2)), "36.30");
        assert_eq!(format_amount(Decimal::from(100)), "100.00");
        assert_eq!(format_amount(Decimal::new(-100000, 2)), "-1,000.00");
    }

    #[test]
    fn parses_item_input() {
        let (id, qty) = parse_item_input("consulting:8").unwrap();
        assert_eq!(id, "consulting");
        assert_eq!(qty, Decimal::from(8));

        let (_, qty) = parse_item_input("consulting:1.5").unwrap();
        assert_eq!(qty, Decimal::new(15, 1));

        assert!(matches!(
            parse_item_input("consulting"),
            Err(InvoiceError::InvalidItemFormat(_))
        ));
        assert!(matches!(
            parse_item_input("a:b:c"),
            Err(InvoiceError::InvalidItemFormat(_))
        ));
        assert!(matches!(
            parse_item_input("consulting:abc"),
            Err(InvoiceError::InvalidLineInput {
                field: LineField::Quantity,
                ..
            })
        ));
    }

    #[test]
    fn resolves_index_newest_first() {
        let entry = |n: &str| HistoryEntry {
            number: n.to_string(),
            client: "c".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            issued_on: None,
            notes: None,
            invoice: Invoice::new(),
        };
        let history = vec![entry("2025-0001"), entry("2025-0002")];
        assert_eq!(resolve_invoice_number(&history, "1").unwrap(), "2025-0002");
        assert_eq!(resolve_invoice_number(&history, "2").unwrap(), "2025-0001");
        assert!(resolve_invoice_number(&history, "0").is_err());
        assert!(resolve_invoice_number(&history, "3").is_err());
        assert_eq!(
            resolve_invoice_number(&history, "2025-0001").unwrap(),
            "2025-0001"
        );
        assert!(matches!(
            resolve_invoice_number(&history, "2025-0009"),
            Err(InvoiceError::InvoiceNotFound(_))
        ));
    }

    #[test]
    fn exact_number_wins_over_index() {
        let entry = |n: &str| HistoryEntry {
            number: n.to_string(),
            client: "c".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            issued_on: None,
            notes: None,
            invoice: Invoice::new(),
        };
        let history = vec![entry("1"), entry("2"), entry("3")];
        assert_eq!(resolve_invoice_number(&history, "1").unwrap(), "1");
        assert_eq!(resolve_invoice_number(&history, "3").unwrap(), "3");
        assert!(matches!(
            resolve_invoice_number(&history, "4"),
            Err(InvoiceError::InvalidInvoiceIndex(_))
        ));
    }
}
