//! Loan management service: the borrow / return workflow.
//!
//! Both lifecycle events are a single store call, so the read-check-write
//! sequence (member exists, book available, insert loan, flip book status)
//! is committed or rolled back as a whole by the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate};

use super::{fees::LateFeePolicy, members::MembersService, non_blank, today};
use crate::{
    config::LibraryConfig,
    error::{AppError, AppResult},
    models::{
        loan::{BorrowReceipt, BorrowRequest, Loan, LoanDetails, NewLoan, ReturnReceipt, ReturnRequest},
        member::MemberLogin,
    },
    repository::LibraryStore,
};

#[derive(Clone)]
pub struct LoansService {
    store: Arc<dyn LibraryStore>,
    members: MembersService,
    config: LibraryConfig,
}

impl LoansService {
    pub fn new(store: Arc<dyn LibraryStore>, members: MembersService, config: LibraryConfig) -> Self {
        Self {
            store,
            members,
            config,
        }
    }

    pub fn fee_policy(&self) -> LateFeePolicy {
        LateFeePolicy::from_config(&self.config)
    }

    /// Borrow a book today
    pub async fn borrow(&self, request: BorrowRequest) -> AppResult<BorrowReceipt> {
        self.borrow_on(request, today()).await
    }

    /// Borrow a book with an explicit loan date
    pub async fn borrow_on(&self, request: BorrowRequest, loan_date: NaiveDate) -> AppResult<BorrowReceipt> {
        let book_id = request
            .book_id
            .ok_or_else(|| AppError::Validation("book_id is required".to_string()))?;

        let duration_days = request.duration_days.unwrap_or(self.config.default_loan_days);
        if duration_days <= 0 {
            return Err(AppError::Validation(
                "duration_days must be a positive number of days".to_string(),
            ));
        }
        let planned_return_date = loan_date
            .checked_add_signed(Duration::days(i64::from(duration_days)))
            .ok_or_else(|| AppError::Validation("duration_days is too large".to_string()))?;

        let member_id = match (request.member_id, non_blank(request.member_name.as_deref())) {
            (Some(id), _) => id,
            (None, Some(name)) => {
                let login = MemberLogin {
                    name,
                    group_label: None,
                };
                self.members.login(login).await?.0.id
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "member_id or member_name is required".to_string(),
                ))
            }
        };

        let new_loan = NewLoan {
            book_id,
            member_id,
            loan_date,
            duration_days,
            planned_return_date,
            require_approved: self.config.approval_gate_enabled,
        };

        let loan = self.store.loans_open(&new_loan).await?;
        tracing::info!(
            loan_id = loan.id,
            book_id,
            member_id,
            planned_return_date = %planned_return_date,
            "Book borrowed"
        );

        Ok(BorrowReceipt {
            loan_id: loan.id,
            planned_return_date: loan.planned_return_date,
        })
    }

    /// Return a borrowed book on the date given in the request
    pub async fn return_loan(&self, loan_id: i32, request: ReturnRequest) -> AppResult<ReturnReceipt> {
        let returned_on = parse_return_date(request.actual_return_date.as_deref())?;
        self.return_on(loan_id, returned_on).await
    }

    /// Return a borrowed book with an explicit return date
    pub async fn return_on(&self, loan_id: i32, returned_on: NaiveDate) -> AppResult<ReturnReceipt> {
        let (loan, late) = self
            .store
            .loans_close(loan_id, returned_on, &self.fee_policy())
            .await?;

        tracing::info!(
            loan_id,
            book_id = ?loan.book_id,
            days_late = late.days_late,
            fee = late.fee,
            "Book returned"
        );

        Ok(ReturnReceipt {
            loan_id,
            days_late: late.days_late,
            fee: late.fee,
        })
    }

    pub async fn get(&self, loan_id: i32) -> AppResult<Loan> {
        self.store.loans_get(loan_id).await
    }

    /// All loans, open and closed
    pub async fn history(&self) -> AppResult<Vec<LoanDetails>> {
        self.store.loans_history().await
    }

    pub async fn open_loans(&self) -> AppResult<Vec<LoanDetails>> {
        self.store.loans_open_list().await
    }
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its date part is used)
pub fn parse_return_date(raw: Option<&str>) -> AppResult<NaiveDate> {
    let raw = raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::Validation("actual_return_date is required".to_string()))?;

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| {
            AppError::Validation(format!(
                "actual_return_date '{}' is not a valid date (expected YYYY-MM-DD)",
                raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::book::{Book, BookStatus, CreateBook, Submitter},
        models::member::CreateMember,
        repository::{MemoryStore, MockLibraryStore},
        services::{fees::LateFee, Services},
    };
    use tokio_test::assert_err;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn services(config: LibraryConfig) -> Services {
        Services::new(Arc::new(MemoryStore::new()), config)
    }

    async fn seed_book(services: &Services, code: &str, submitter: Submitter) -> Book {
        services
            .catalog
            .submit(
                CreateBook {
                    code: code.to_string(),
                    title: format!("Title of {}", code),
                    ..CreateBook::default()
                },
                submitter,
            )
            .await
            .unwrap()
    }

    async fn seed_member(services: &Services, name: &str) -> i32 {
        services
            .members
            .register(CreateMember {
                name: name.to_string(),
                group_label: None,
            })
            .await
            .unwrap()
            .id
    }

    fn borrow(book_id: i32, member_id: i32, days: Option<i32>) -> BorrowRequest {
        BorrowRequest {
            book_id: Some(book_id),
            member_id: Some(member_id),
            member_name: None,
            duration_days: days,
        }
    }

    /// borrowed <=> exactly one open loan, for every book
    async fn assert_availability_invariant(services: &Services) {
        let books = services.catalog.search(None, Submitter::Librarian).await.unwrap();
        let open = services.loans.open_loans().await.unwrap();
        for book in books {
            let holders = open.iter().filter(|l| l.book_id == Some(book.id)).count();
            assert!(holders <= 1, "book {} has {} open loans", book.code, holders);
            assert_eq!(
                book.status == BookStatus::Borrowed,
                holders == 1,
                "book {} status {:?} with {} open loans",
                book.code,
                book.status,
                holders
            );
        }
    }

    #[tokio::test]
    async fn test_borrow_sets_due_date_and_marks_book_borrowed() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;

        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, Some(7)), day(1))
            .await
            .unwrap();

        assert_eq!(receipt.planned_return_date, day(8));
        let book = services.catalog.get(book.id).await.unwrap();
        assert_eq!(book.status, BookStatus::Borrowed);
        assert!(services.catalog.available().await.unwrap().is_empty());
        assert_availability_invariant(&services).await;
    }

    #[tokio::test]
    async fn test_late_return_charges_per_day() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;
        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, Some(7)), day(1))
            .await
            .unwrap();

        let returned = services
            .loans
            .return_on(receipt.loan_id, day(11))
            .await
            .unwrap();

        assert_eq!(returned.days_late, 3);
        assert_eq!(returned.fee, 15000);
        assert_eq!(
            services.catalog.get(book.id).await.unwrap().status,
            BookStatus::Available
        );

        let loan = services.loans.get(receipt.loan_id).await.unwrap();
        assert_eq!(loan.actual_return_date, Some(day(11)));
        assert_eq!(loan.fee, 15000);
        assert_availability_invariant(&services).await;
    }

    #[tokio::test]
    async fn test_early_return_is_free() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;
        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, Some(7)), day(1))
            .await
            .unwrap();

        let returned = services
            .loans
            .return_loan(
                receipt.loan_id,
                ReturnRequest {
                    actual_return_date: Some("2024-05-06".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(returned.days_late, 0);
        assert_eq!(returned.fee, 0);
    }

    #[tokio::test]
    async fn test_second_return_is_not_found() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;
        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap();

        services.loans.return_on(receipt.loan_id, day(2)).await.unwrap();
        let err = services
            .loans
            .return_on(receipt.loan_id, day(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // First return is kept untouched
        let loan = services.loans.get(receipt.loan_id).await.unwrap();
        assert_eq!(loan.actual_return_date, Some(day(2)));
    }

    #[tokio::test]
    async fn test_borrowing_borrowed_book_conflicts_and_changes_nothing() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let first = seed_member(&services, "Andi").await;
        let second = seed_member(&services, "Rina").await;

        services
            .loans
            .borrow_on(borrow(book.id, first, None), day(1))
            .await
            .unwrap();
        let history_before = services.loans.history().await.unwrap();
        let book_before = services.catalog.get(book.id).await.unwrap();

        let err = services
            .loans
            .borrow_on(borrow(book.id, second, None), day(2))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(services.loans.history().await.unwrap(), history_before);
        assert_eq!(services.catalog.get(book.id).await.unwrap(), book_before);
        assert_availability_invariant(&services).await;
    }

    #[tokio::test]
    async fn test_borrow_default_duration_comes_from_config() {
        let services = services(LibraryConfig {
            default_loan_days: 14,
            ..LibraryConfig::default()
        });
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;

        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap();
        assert_eq!(receipt.planned_return_date, day(15));
    }

    #[tokio::test]
    async fn test_borrow_validation_and_missing_references() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;

        let err = services
            .loans
            .borrow_on(borrow(book.id, member, Some(0)), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let no_member = BorrowRequest {
            book_id: Some(book.id),
            ..BorrowRequest::default()
        };
        let err = services.loans.borrow_on(no_member, day(1)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = services
            .loans
            .borrow_on(borrow(book.id, 999, None), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("Member")));

        let err = services
            .loans
            .borrow_on(borrow(999, member, None), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m.contains("Book")));

        assert!(services.loans.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_borrow_by_name_registers_missing_member() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;

        let request = BorrowRequest {
            book_id: Some(book.id),
            member_name: Some("Dewi".to_string()),
            ..BorrowRequest::default()
        };
        services.loans.borrow_on(request, day(1)).await.unwrap();

        let open = services.loans.open_loans().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].member_name.as_deref(), Some("Dewi"));
        assert_eq!(open[0].book_code.as_deref(), Some("B001"));
        assert_eq!(services.members.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_book_is_not_borrowable() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "P001", Submitter::Visitor).await;
        let member = seed_member(&services, "Andi").await;

        let err = services
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        services.catalog.approve(book.id).await.unwrap();
        services
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deletes_are_blocked_by_open_loans() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;
        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap();

        assert!(matches!(services.members.delete(member).await, Err(AppError::Conflict(_))));
        assert!(matches!(services.catalog.delete(book.id).await, Err(AppError::Conflict(_))));

        services.loans.return_on(receipt.loan_id, day(4)).await.unwrap();
        assert_eq!(services.members.delete(member).await.unwrap(), member);
        assert_eq!(services.catalog.delete(book.id).await.unwrap(), book.id);

        // History survives the deletions
        let history = services.loans.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].book_id, None);
        assert_eq!(history[0].member_id, None);
        assert_eq!(history[0].book_code, None);
    }

    #[tokio::test]
    async fn test_fees_disabled_reports_days_without_charging() {
        let services = services(LibraryConfig {
            fees_enabled: false,
            ..LibraryConfig::default()
        });
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let member = seed_member(&services, "Andi").await;
        let receipt = services
            .loans
            .borrow_on(borrow(book.id, member, Some(7)), day(1))
            .await
            .unwrap();

        let returned = services.loans.return_on(receipt.loan_id, day(11)).await.unwrap();
        assert_eq!(returned.days_late, 3);
        assert_eq!(returned.fee, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_borrows_have_one_winner() {
        let services = services(LibraryConfig::default());
        let book = seed_book(&services, "B001", Submitter::Librarian).await;
        let first = seed_member(&services, "Andi").await;
        let second = seed_member(&services, "Rina").await;

        let book_id = book.id;
        let attempts: Vec<_> = [first, second]
            .into_iter()
            .map(|member| {
                let loans = services.loans.clone();
                tokio::spawn(async move { loans.borrow_on(borrow(book_id, member, None), day(1)).await })
            })
            .collect();

        let mut wins = 0;
        let mut conflicts = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => wins += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        assert_eq!((wins, conflicts), (1, 1));
        assert_eq!(services.loans.open_loans().await.unwrap().len(), 1);
        assert_availability_invariant(&services).await;
    }

    #[tokio::test]
    async fn test_borrowed_pending_book_cannot_be_rejected() {
        let store: Arc<dyn LibraryStore> = Arc::new(MemoryStore::new());
        let gated = Services::new(store.clone(), LibraryConfig::default());
        let book = seed_book(&gated, "P001", Submitter::Visitor).await;
        assert_eq!(book.approval, crate::models::Approval::Pending);

        // Gate switched off afterwards: pending books become borrowable
        let open = Services::new(
            store,
            LibraryConfig {
                approval_gate_enabled: false,
                ..LibraryConfig::default()
            },
        );
        let member = seed_member(&open, "Yusuf").await;
        let receipt = open
            .loans
            .borrow_on(borrow(book.id, member, None), day(1))
            .await
            .unwrap();

        let err = open.catalog.reject(book.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(open.catalog.get(book.id).await.unwrap().status, BookStatus::Borrowed);
        let loans = open.loans.open_loans().await.unwrap();
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].id, receipt.loan_id);
        assert_eq!(loans[0].book_id, Some(book.id));
        assert_availability_invariant(&open).await;

        // Once returned, the pending entry can be rejected again
        open.loans.return_on(receipt.loan_id, day(3)).await.unwrap();
        assert_eq!(open.catalog.reject(book.id).await.unwrap(), book.id);
    }

    #[tokio::test]
    async fn test_store_failure_is_propagated() {
        let mut store = MockLibraryStore::new();
        store
            .expect_loans_open()
            .times(1)
            .returning(|_| Err(AppError::Database(sqlx::Error::PoolTimedOut)));

        let store: Arc<dyn LibraryStore> = Arc::new(store);
        let loans = LoansService::new(
            store.clone(),
            MembersService::new(store),
            LibraryConfig::default(),
        );

        let result = loans.borrow_on(borrow(1, 1, None), day(1)).await;
        assert!(matches!(assert_err!(result), AppError::Database(_)));
    }

    #[tokio::test]
    async fn test_return_passes_configured_policy_to_store() {
        let mut store = MockLibraryStore::new();
        store
            .expect_loans_close()
            .withf(|id, on, policy| *id == 3 && *on == day(20) && !policy.enabled)
            .times(1)
            .returning(|id, on, _| {
                let loan = Loan {
                    id,
                    book_id: Some(1),
                    member_id: Some(1),
                    loan_date: day(1),
                    duration_days: 7,
                    planned_return_date: day(8),
                    actual_return_date: Some(on),
                    status: crate::models::LoanStatus::Closed,
                    fee: 0,
                };
                Ok((loan, LateFee { days_late: 12, fee: 0 }))
            });

        let store: Arc<dyn LibraryStore> = Arc::new(store);
        let loans = LoansService::new(
            store.clone(),
            MembersService::new(store),
            LibraryConfig {
                fees_enabled: false,
                ..LibraryConfig::default()
            },
        );

        let receipt = loans.return_on(3, day(20)).await.unwrap();
        assert_eq!(receipt, ReturnReceipt { loan_id: 3, days_late: 12, fee: 0 });
    }

    #[test]
    fn test_parse_return_date() {
        assert_eq!(parse_return_date(Some("2024-05-11")).unwrap(), day(11));
        assert_eq!(
            parse_return_date(Some("2024-05-11T09:30:00Z")).unwrap(),
            day(11)
        );
        assert!(matches!(parse_return_date(None), Err(AppError::Validation(_))));
        assert!(matches!(parse_return_date(Some(" ")), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_return_date(Some("11/05/2024")),
            Err(AppError::Validation(_))
        ));
    }
}
