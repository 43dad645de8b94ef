//! In-process store.
//!
//! All state sits behind one async mutex and every operation performs its
//! checks and writes under a single guard, which gives each operation the
//! same all-or-nothing behaviour as a database transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::LibraryStore;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Approval, Book, BookQuery, BookStatus, NewBook, UpdateBook},
        loan::{Loan, LoanDetails, LoanStatus, NewLoan},
        member::{Member, NewMember},
    },
    services::fees::{LateFee, LateFeePolicy},
};

#[derive(Default)]
struct MemoryState {
    books: BTreeMap<i32, Book>,
    members: BTreeMap<i32, Member>,
    loans: BTreeMap<i32, Loan>,
    last_book_id: i32,
    last_member_id: i32,
    last_loan_id: i32,
}

impl MemoryState {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn code_taken(&self, code: &str, exclude_id: Option<i32>) -> bool {
        self.books
            .values()
            .any(|b| b.code == code && Some(b.id) != exclude_id)
    }

    fn details(&self, loan: &Loan) -> LoanDetails {
        let book = loan.book_id.and_then(|id| self.books.get(&id));
        let member = loan.member_id.and_then(|id| self.members.get(&id));
        LoanDetails {
            id: loan.id,
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            duration_days: loan.duration_days,
            planned_return_date: loan.planned_return_date,
            actual_return_date: loan.actual_return_date,
            status: loan.status,
            fee: loan.fee,
            book_code: book.map(|b| b.code.clone()),
            book_title: book.map(|b| b.title.clone()),
            publisher: book.and_then(|b| b.publisher.clone()),
            year: book.and_then(|b| b.year),
            member_name: member.map(|m| m.name.clone()),
        }
    }

    /// Loans matching `filter`, newest first
    fn loan_details(&self, filter: impl Fn(&Loan) -> bool) -> Vec<LoanDetails> {
        let mut loans: Vec<LoanDetails> = self
            .loans
            .values()
            .filter(|l| filter(*l))
            .map(|l| self.details(l))
            .collect();
        loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(b.id.cmp(&a.id)));
        loans
    }
}

fn newest_intake_first(books: &mut [Book]) {
    books.sort_by(|a, b| {
        b.intake_date
            .cmp(&a.intake_date)
            .then_with(|| a.code.cmp(&b.code))
    });
}

/// Store kept entirely in memory; contents are lost on restart
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn books_search(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let needle = query.needle();
        let matches = |text: &str| {
            needle
                .as_deref()
                .map_or(true, |n| text.to_lowercase().contains(n))
        };

        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| query.include_pending || b.approval == Approval::Approved)
            .filter(|b| {
                needle.is_none()
                    || matches(&b.code)
                    || matches(&b.title)
                    || b.publisher.as_deref().is_some_and(matches)
            })
            .cloned()
            .collect();
        newest_intake_first(&mut books);
        Ok(books)
    }

    async fn books_available(&self) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.status == BookStatus::Available && b.approval == Approval::Approved)
            .cloned()
            .collect();
        books.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(books)
    }

    async fn books_pending(&self) -> AppResult<Vec<Book>> {
        let state = self.state.lock().await;
        let mut books: Vec<Book> = state
            .books
            .values()
            .filter(|b| b.approval == Approval::Pending)
            .cloned()
            .collect();
        newest_intake_first(&mut books);
        Ok(books)
    }

    async fn books_get(&self, id: i32) -> AppResult<Book> {
        self.state.lock().await.book(id).cloned()
    }

    async fn books_code_exists(&self, code: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.state.lock().await.code_taken(code, exclude_id))
    }

    async fn books_create(&self, book: &NewBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        if state.code_taken(&book.code, None) {
            return Err(AppError::Conflict(
                "A book with this code already exists".to_string(),
            ));
        }

        state.last_book_id += 1;
        let created = Book {
            id: state.last_book_id,
            code: book.code.clone(),
            title: book.title.clone(),
            publisher: book.publisher.clone(),
            year: book.year,
            intake_date: book.intake_date,
            status: BookStatus::Available,
            approval: book.approval,
        };
        state.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn books_update(&self, id: i32, changes: &UpdateBook) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        let current = state.book(id)?;

        if current.approval == Approval::Approved && changes.approved == Some(false) {
            return Err(AppError::Conflict(
                "An approved book cannot return to pending".to_string(),
            ));
        }
        if let Some(code) = &changes.code {
            if state.code_taken(code, Some(id)) {
                return Err(AppError::Conflict(
                    "A book with this code already exists".to_string(),
                ));
            }
        }

        let mut book = current.clone();
        if let Some(code) = &changes.code {
            book.code = code.clone();
        }
        if let Some(title) = &changes.title {
            book.title = title.clone();
        }
        if let Some(publisher) = &changes.publisher {
            book.publisher = Some(publisher.clone());
        }
        if let Some(year) = changes.year {
            book.year = Some(year);
        }
        if let Some(intake_date) = changes.intake_date {
            book.intake_date = intake_date;
        }
        if changes.approved == Some(true) {
            book.approval = Approval::Approved;
        }

        state.books.insert(id, book.clone());
        Ok(book)
    }

    async fn books_approve(&self, id: i32) -> AppResult<Book> {
        let mut state = self.state.lock().await;
        let book = state
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if book.approval != Approval::Pending {
            return Err(AppError::Conflict(format!(
                "Book {} is not pending approval",
                id
            )));
        }
        book.approval = Approval::Approved;
        Ok(book.clone())
    }

    async fn books_reject(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let book = state.book(id)?;
        if book.approval != Approval::Pending {
            return Err(AppError::Conflict(format!(
                "Book {} is not pending approval",
                id
            )));
        }
        if book.status == BookStatus::Borrowed {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be rejected".to_string(),
            ));
        }
        state.books.remove(&id);
        Ok(())
    }

    async fn books_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.book(id)?.status == BookStatus::Borrowed {
            return Err(AppError::Conflict(
                "Book is currently borrowed and cannot be deleted".to_string(),
            ));
        }

        state.books.remove(&id);
        // ON DELETE SET NULL
        for loan in state.loans.values_mut() {
            if loan.book_id == Some(id) {
                loan.book_id = None;
            }
        }
        Ok(())
    }

    async fn members_list(&self) -> AppResult<Vec<Member>> {
        let state = self.state.lock().await;
        let mut members: Vec<Member> = state.members.values().cloned().collect();
        members.sort_by(|a, b| {
            b.registered_on
                .cmp(&a.registered_on)
                .then(b.id.cmp(&a.id))
        });
        Ok(members)
    }

    async fn members_get(&self, id: i32) -> AppResult<Member> {
        self.state
            .lock()
            .await
            .members
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    async fn members_find_by_name(&self, name: &str) -> AppResult<Option<Member>> {
        let wanted = name.trim().to_lowercase();
        let state = self.state.lock().await;
        // BTreeMap iterates in id order, so the oldest registration wins
        Ok(state
            .members
            .values()
            .find(|m| m.name.to_lowercase() == wanted)
            .cloned())
    }

    async fn members_create(&self, member: &NewMember) -> AppResult<Member> {
        let mut state = self.state.lock().await;
        state.last_member_id += 1;
        let created = Member {
            id: state.last_member_id,
            name: member.name.clone(),
            group_label: member.group_label.clone(),
            registered_on: member.registered_on,
        };
        state.members.insert(created.id, created.clone());
        Ok(created)
    }

    async fn members_delete(&self, id: i32) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.members.contains_key(&id) {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }

        let open_loans = state
            .loans
            .values()
            .filter(|l| l.member_id == Some(id) && l.status == LoanStatus::Open)
            .count();
        if open_loans > 0 {
            return Err(AppError::Conflict(format!(
                "Member has {} open loan(s) and cannot be deleted",
                open_loans
            )));
        }

        state.members.remove(&id);
        for loan in state.loans.values_mut() {
            if loan.member_id == Some(id) {
                loan.member_id = None;
            }
        }
        Ok(())
    }

    async fn loans_get(&self, id: i32) -> AppResult<Loan> {
        self.state
            .lock()
            .await
            .loans
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn loans_open(&self, loan: &NewLoan) -> AppResult<Loan> {
        let mut state = self.state.lock().await;

        if !state.members.contains_key(&loan.member_id) {
            return Err(AppError::NotFound(format!(
                "Member with id {} not found",
                loan.member_id
            )));
        }

        let book = state.book(loan.book_id)?;
        if loan.require_approved && book.approval != Approval::Approved {
            return Err(AppError::Conflict("Book is not yet approved".to_string()));
        }
        if book.status == BookStatus::Borrowed {
            return Err(AppError::Conflict("Book is already borrowed".to_string()));
        }

        state.last_loan_id += 1;
        let created = Loan {
            id: state.last_loan_id,
            book_id: Some(loan.book_id),
            member_id: Some(loan.member_id),
            loan_date: loan.loan_date,
            duration_days: loan.duration_days,
            planned_return_date: loan.planned_return_date,
            actual_return_date: None,
            status: LoanStatus::Open,
            fee: 0,
        };
        state.loans.insert(created.id, created.clone());
        if let Some(book) = state.books.get_mut(&loan.book_id) {
            book.status = BookStatus::Borrowed;
        }
        Ok(created)
    }

    async fn loans_close(
        &self,
        id: i32,
        returned_on: NaiveDate,
        policy: &LateFeePolicy,
    ) -> AppResult<(Loan, LateFee)> {
        let mut state = self.state.lock().await;

        let loan = state
            .loans
            .get_mut(&id)
            .filter(|l| l.status == LoanStatus::Open)
            .ok_or_else(|| {
                AppError::NotFound(format!("Loan {} not found or already returned", id))
            })?;

        let late = policy.assess(loan.planned_return_date, returned_on);
        loan.status = LoanStatus::Closed;
        loan.actual_return_date = Some(returned_on);
        loan.fee = late.fee;
        let closed = loan.clone();

        if let Some(book) = closed.book_id.and_then(|b| state.books.get_mut(&b)) {
            book.status = BookStatus::Available;
        }
        Ok((closed, late))
    }

    async fn loans_history(&self) -> AppResult<Vec<LoanDetails>> {
        Ok(self.state.lock().await.loan_details(|_| true))
    }

    async fn loans_open_list(&self) -> AppResult<Vec<LoanDetails>> {
        Ok(self
            .state
            .lock()
            .await
            .loan_details(|l| l.status == LoanStatus::Open))
    }

    async fn loans_open_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        Ok(self
            .state
            .lock()
            .await
            .loan_details(|l| l.status == LoanStatus::Open && l.member_id == Some(member_id)))
    }
}
