use anyhow::{bail, Context, Result};
use bill_manager::models::{Bill, BillListResponse, BillQuery, CreateBillRequest};
use bill_manager::reports::Report;
use bill_manager::upload::{
    content_type_for, UploadFile, UploadFilePayload, UploadRequest, UploadResult,
};
use bill_manager::user_models::{CreateUserRequest, User, UserListResponse, UserQuery};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bills")]
#[command(about = "A CLI tool for managing bills, vendors and users", long_about = None)]
struct Cli {
    #[arg(
        long,
        env = "BILL_MANAGER_API_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of the bill manager server"
    )]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(short, long, help = "Case-insensitive text search (bill number, vendor, description)")]
    search: Option<String>,

    #[arg(long, help = "Statuses to keep (comma-separated: pending,paid,overdue,cancelled)")]
    status: Option<String>,

    #[arg(long, help = "Categories to keep (comma-separated)")]
    category: Option<String>,

    #[arg(long, requires = "to", help = "Due after this date (YYYY-MM-DD, exclusive)")]
    from: Option<NaiveDate>,

    #[arg(long, requires = "from", help = "Due before this date (YYYY-MM-DD, exclusive)")]
    to: Option<NaiveDate>,

    #[arg(long, requires = "max_amount", help = "Minimum amount (inclusive)")]
    min_amount: Option<f64>,

    #[arg(long, requires = "min_amount", help = "Maximum amount (inclusive)")]
    max_amount: Option<f64>,
}

impl From<FilterArgs> for BillQuery {
    fn from(args: FilterArgs) -> Self {
        BillQuery {
            search: args.search,
            status: args.status,
            category: args.category,
            from: args.from.map(|d| d.to_string()),
            to: args.to.map(|d| d.to_string()),
            min_amount: args.min_amount,
            max_amount: args.max_amount,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List bills, optionally filtered")]
    Bills {
        #[command(flatten)]
        filters: FilterArgs,
    },

    #[command(about = "Add a bill manually")]
    AddBill {
        #[arg(short = 'n', long, help = "Bill number, e.g. INV-2024-006")]
        number: String,

        #[arg(short, long, help = "Vendor name")]
        vendor: String,

        #[arg(short, long, help = "Amount")]
        amount: f64,

        #[arg(short, long, help = "Due date (YYYY-MM-DD)")]
        due: NaiveDate,

        #[arg(short, long, help = "Category (Office Supplies, Software, Utilities, Rent, Travel, Other)")]
        category: String,

        #[arg(long, help = "Optional description")]
        description: Option<String>,
    },

    #[command(about = "Delete a bill (cannot be undone)")]
    DeleteBill {
        #[arg(help = "Bill ID")]
        id: String,
    },

    #[command(about = "List users, optionally searched")]
    Users {
        #[arg(short, long, help = "Search name, email or department")]
        search: Option<String>,

        #[arg(long, help = "active or inactive")]
        status: Option<String>,

        #[arg(long, help = "Departments to keep (comma-separated)")]
        department: Option<String>,

        #[arg(long, help = "Roles to keep: admin, manager, user (comma-separated)")]
        role: Option<String>,
    },

    #[command(about = "Add a user")]
    AddUser {
        #[arg(short, long, help = "Full name")]
        name: String,

        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(short, long, default_value = "user", help = "admin, manager or user")]
        role: String,

        #[arg(short, long, help = "Department")]
        department: String,
    },

    #[command(about = "Delete a user (cannot be undone)")]
    DeleteUser {
        #[arg(help = "User ID")]
        id: String,
    },

    #[command(about = "Upload bill files (CSV rows become bills)")]
    Upload {
        #[arg(required = true, help = "Files to upload")]
        files: Vec<PathBuf>,

        #[arg(long, help = "Only show the extracted bills, do not save them")]
        preview: bool,
    },

    #[command(about = "Show the bills report")]
    Report {
        #[arg(short, long, default_value = "monthly", help = "monthly, quarterly or yearly")]
        period: String,

        #[arg(long, requires = "to", help = "Due after this date (YYYY-MM-DD, exclusive)")]
        from: Option<NaiveDate>,

        #[arg(long, requires = "from", help = "Due before this date (YYYY-MM-DD, exclusive)")]
        to: Option<NaiveDate>,
    },

    #[command(about = "Export bills as CSV")]
    Export {
        #[command(flatten)]
        filters: FilterArgs,

        #[arg(short, long, help = "Write to this file instead of stdout")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = ApiClient::new(cli.api_url);

    let result = match cli.command {
        Commands::Bills { filters } => view_bills(&client, filters.into()).await,
        Commands::AddBill {
            number,
            vendor,
            amount,
            due,
            category,
            description,
        } => {
            let request = CreateBillRequest {
                bill_number: number,
                vendor,
                amount,
                due_date: due.to_string(),
                category,
                description,
                status: None,
                attachments: Vec::new(),
            };
            add_bill(&client, request).await
        }
        Commands::DeleteBill { id } => client.delete(&format!("/bills/{}", id)).await.map(|_| {
            println!("🗑️  Bill {} deleted", id);
        }),
        Commands::Users {
            search,
            status,
            department,
            role,
        } => {
            let query = UserQuery {
                search,
                status,
                department,
                role,
            };
            view_users(&client, query).await
        }
        Commands::AddUser {
            name,
            email,
            role,
            department,
        } => {
            let request = CreateUserRequest {
                name,
                email,
                role,
                department,
            };
            add_user(&client, request).await
        }
        Commands::DeleteUser { id } => client.delete(&format!("/users/{}", id)).await.map(|_| {
            println!("🗑️  User {} deleted", id);
        }),
        Commands::Upload { files, preview } => upload(&client, files, preview).await,
        Commands::Report { period, from, to } => view_report(&client, period, from, to).await,
        Commands::Export { filters, out } => export(&client, filters.into(), out).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    fn new(base: String) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get_json<T: DeserializeOwned, Q: serde::Serialize>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let response = self.http.get(self.url(path)).query(query).send().await?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        read_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let response = self.http.delete(self.url(path)).send().await?;
        if !response.status().is_success() {
            bail!("Request failed: {}", error_text(response).await);
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        bail!("Request failed: {}", error_text(response).await);
    }
    response.json().await.context("Unexpected response from server")
}

async fn error_text(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    format!("{} ({})", message, status)
}

async fn view_bills(client: &ApiClient, query: BillQuery) -> Result<()> {
    let result: BillListResponse = client.get_json("/bills", &query).await?;

    if result.bills.is_empty() {
        println!("📭 No bills match the current filters.");
        return Ok(());
    }

    println!("\n📋 Bills ({})\n", result.bills.len());
    bill_table(&result.bills).printstd();

    let s = result.summary;
    println!(
        "\nTotal ${:.2} | Pending {} | Paid {} | Overdue {} | Cancelled {}\n",
        s.total_amount, s.pending, s.paid, s.overdue, s.cancelled
    );
    Ok(())
}

fn bill_table(bills: &[Bill]) -> Table {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Bill Number"),
        Cell::new("Vendor"),
        Cell::new("Amount"),
        Cell::new("Due Date"),
        Cell::new("Status"),
        Cell::new("Category"),
    ]));

    for bill in bills {
        let short_id: String = bill.id.chars().take(8).collect();
        table.add_row(Row::new(vec![
            Cell::new(&short_id),
            Cell::new(&bill.bill_number),
            Cell::new(&bill.vendor),
            Cell::new(&format!("${:.2}", bill.amount)),
            Cell::new(&bill.due_date.format("%b %d, %Y").to_string()),
            Cell::new(bill.status.as_str()),
            Cell::new(&bill.category),
        ]));
    }
    table
}

async fn add_bill(client: &ApiClient, request: CreateBillRequest) -> Result<()> {
    let bill: Bill = client.post_json("/bills", &request).await?;

    println!("✅ Bill added successfully!");
    println!("   Number: {}", bill.bill_number);
    println!("   Vendor: {}", bill.vendor);
    println!("   Amount: ${:.2}", bill.amount);
    println!("   Due: {}", bill.due_date.format("%B %d, %Y"));
    println!("   ID: {}", bill.id);
    Ok(())
}

async fn view_users(client: &ApiClient, query: UserQuery) -> Result<()> {
    let result: UserListResponse = client.get_json("/users", &query).await?;

    if result.users.is_empty() {
        println!("📭 No users found.");
        return Ok(());
    }

    println!("\n👥 Users ({})\n", result.users.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("ID"),
        Cell::new("Name"),
        Cell::new("Email"),
        Cell::new("Role"),
        Cell::new("Department"),
        Cell::new("Status"),
        Cell::new("Last Login"),
    ]));

    for user in &result.users {
        let last_login = user
            .last_login
            .map(|d| d.to_string())
            .unwrap_or_else(|| "Never".to_string());
        let short_id: String = user.id.chars().take(8).collect();
        table.add_row(Row::new(vec![
            Cell::new(&short_id),
            Cell::new(&user.name),
            Cell::new(&user.email),
            Cell::new(user.role.as_str()),
            Cell::new(&user.department),
            Cell::new(user.status.as_str()),
            Cell::new(&last_login),
        ]));
    }

    table.printstd();
    let s = result.summary;
    println!(
        "\nTotal {} | Active {} | Admins {}\n",
        s.total_users, s.active_users, s.admins
    );
    Ok(())
}

async fn add_user(client: &ApiClient, request: CreateUserRequest) -> Result<()> {
    let user: User = client.post_json("/users", &request).await?;
    println!("✅ User added successfully!");
    println!("   Name: {}", user.name);
    println!("   Email: {}", user.email);
    println!("   Role: {}", user.role);
    println!("   ID: {}", user.id);
    Ok(())
}

async fn upload(client: &ApiClient, paths: Vec<PathBuf>, preview: bool) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let content_type = content_type_for(path).with_context(|| {
            format!(
                "{}: only PDF, image, CSV or Excel files can be uploaded",
                path.display()
            )
        })?;
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadFilePayload::encode(&UploadFile {
            filename,
            content_type: content_type.to_string(),
            bytes,
        }));
    }

    let endpoint = if preview { "/uploads/preview" } else { "/uploads" };
    let response = client
        .http
        .post(client.url(endpoint))
        .json(&UploadRequest { files })
        .send()
        .await?;

    // A rejected commit still carries the extraction report.
    let status = response.status();
    if !status.is_success() && status != reqwest::StatusCode::UNPROCESSABLE_ENTITY {
        bail!("Upload failed: {}", error_text(response).await);
    }
    let result: UploadResult = response.json().await.context("Unexpected response from server")?;

    if result.success {
        println!("✅ {}", result.message);
    } else {
        println!("⚠️  {}", result.message);
    }

    if !result.bills.is_empty() {
        println!();
        bill_table(&result.bills).printstd();
    }

    for issue in &result.errors {
        match issue.line {
            Some(line) => println!("   {}:{}: {}", issue.file, line, issue.message),
            None => println!("   {}: {}", issue.file, issue.message),
        }
    }

    if preview {
        println!("\nPreview only. Run again without --preview to save these bills.");
    } else if !result.success {
        bail!("No bills were saved");
    }
    Ok(())
}

async fn view_report(
    client: &ApiClient,
    period: String,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<()> {
    let mut query = vec![("period", period)];
    if let (Some(from), Some(to)) = (from, to) {
        query.push(("from", from.to_string()));
        query.push(("to", to.to_string()));
    }
    let report: Report = client.get_json("/reports", &query).await?;

    println!(
        "\n📊 {} report: {} bills, ${:.2}\n",
        report.period, report.summary.total_bills, report.summary.total_amount
    );

    let mut periods = Table::new();
    periods.add_row(Row::new(vec![Cell::new("Period"), Cell::new("Amount"), Cell::new("Bills")]));
    for p in &report.by_period {
        periods.add_row(Row::new(vec![
            Cell::new(&p.period),
            Cell::new(&format!("${:.2}", p.amount)),
            Cell::new(&p.bills.to_string()),
        ]));
    }
    periods.printstd();

    println!("\nBy category\n");
    let mut categories = Table::new();
    categories.add_row(Row::new(vec![
        Cell::new("Category"),
        Cell::new("Amount"),
        Cell::new("Bills"),
        Cell::new("Share"),
    ]));
    for c in &report.by_category {
        categories.add_row(Row::new(vec![
            Cell::new(&c.category),
            Cell::new(&format!("${:.2}", c.amount)),
            Cell::new(&c.bills.to_string()),
            Cell::new(&format!("{}%", c.percentage)),
        ]));
    }
    categories.printstd();

    println!("\nTop vendors\n");
    let mut vendors = Table::new();
    vendors.add_row(Row::new(vec![Cell::new("Vendor"), Cell::new("Amount"), Cell::new("Bills")]));
    for v in &report.by_vendor {
        vendors.add_row(Row::new(vec![
            Cell::new(&v.vendor),
            Cell::new(&format!("${:.2}", v.amount)),
            Cell::new(&format!("{} bills", v.bills)),
        ]));
    }
    vendors.printstd();
    println!();
    Ok(())
}

async fn export(client: &ApiClient, query: BillQuery, out: Option<PathBuf>) -> Result<()> {
    let response = client
        .http
        .get(client.url("/bills/export"))
        .query(&query)
        .send()
        .await?;
    if !response.status().is_success() {
        bail!("Export failed: {}", error_text(response).await);
    }
    let csv = response.text().await?;

    match out {
        Some(path) => {
            fs::write(&path, &csv).with_context(|| format!("Failed to write {}", path.display()))?;
            let rows = csv.lines().count().saturating_sub(1);
            println!("✅ Exported {} bills to {}", rows, path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
