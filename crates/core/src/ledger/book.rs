//! The generic ledger engine.
//!
//! A [`WalletBook`] holds one wallet together with its ledger lines and
//! reservations, and implements every mutation as a pure in-memory operation:
//! posting transactions, FIFO bucket consumption, and the reservation
//! lifecycle. Callers load a book under the wallet lock, run operations, and
//! persist the [`BookChanges`] returned by [`WalletBook::take_changes`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saldo_shared::types::{LedgerEntryId, PostingId, ReservationId, UserId};

use super::entry::{LedgerEntry, LedgerEntryType, Reference, ReferenceType};
use super::error::WalletError;
use super::posting::{
    Posting, PostingOutcome, PostingWarning, SufficiencyPolicy, TransactionRequest,
    TransactionType,
};
use super::sheet::BalanceSheet;
use super::wallet::Wallet;
use crate::balance::{BalanceKind, check_positive, check_precision};
use crate::bucket::{BucketConsumer, BucketDraw, BucketEntry, Consumption};
use crate::reservation::{
    CancelOutcome, ConfirmOutcome, Reservation, ReservationStatus, ReservationTransition,
    ReserveOutcome, ReserveRequest,
};

/// Reference status written on usages created by a confirmation.
pub const APPROVED_STATUS: &str = "APPROVED";

/// Everything a book wrote since the last [`WalletBook::take_changes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookChanges<B: BalanceKind> {
    /// New ledger lines, in write order.
    pub entries: Vec<LedgerEntry<B>>,
    /// Remaining-amount decrements, in write order.
    pub draws: Vec<BucketDraw>,
    /// New reservations.
    pub reservations: Vec<Reservation<B>>,
    /// Reservation status changes.
    pub transitions: Vec<ReservationTransition>,
}

impl<B: BalanceKind> Default for BookChanges<B> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            draws: Vec::new(),
            reservations: Vec::new(),
            transitions: Vec::new(),
        }
    }
}

impl<B: BalanceKind> BookChanges<B> {
    /// True when nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.draws.is_empty()
            && self.reservations.is_empty()
            && self.transitions.is_empty()
    }
}

/// One line to write, before ids and timestamps are assigned.
#[derive(Debug, Clone, Copy)]
struct PlannedLine<B> {
    bucket: B,
    amount: Decimal,
}

/// A wallet with its ledger and reservations.
#[derive(Debug, Clone)]
pub struct WalletBook<B: BalanceKind> {
    wallet: Wallet<B>,
    entries: Vec<LedgerEntry<B>>,
    reservations: Vec<Reservation<B>>,
    changes: BookChanges<B>,
}

impl<B: BalanceKind> WalletBook<B> {
    /// Wraps a loaded wallet, its lines and its reservations.
    #[must_use]
    pub fn new(
        wallet: Wallet<B>,
        entries: Vec<LedgerEntry<B>>,
        reservations: Vec<Reservation<B>>,
    ) -> Self {
        Self {
            wallet,
            entries,
            reservations,
            changes: BookChanges::default(),
        }
    }

    /// A fresh zeroed wallet with an empty ledger.
    #[must_use]
    pub fn open(user_id: UserId, year: i32) -> Self {
        Self::new(Wallet::new(user_id, year), Vec::new(), Vec::new())
    }

    /// The wallet aggregate.
    #[must_use]
    pub fn wallet(&self) -> &Wallet<B> {
        &self.wallet
    }

    /// Ledger lines in write order.
    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry<B>] {
        &self.entries
    }

    /// Reservations of the wallet.
    #[must_use]
    pub fn reservations(&self) -> &[Reservation<B>] {
        &self.reservations
    }

    /// Returns and clears the pending change set.
    pub fn take_changes(&mut self) -> BookChanges<B> {
        std::mem::take(&mut self.changes)
    }

    // ========== Queries ==========

    /// Sum of active reservations overlapping `kind`.
    #[must_use]
    pub fn reserved(&self, kind: B, now: DateTime<Utc>) -> Decimal {
        self.reserved_excluding(kind, now, None)
    }

    fn reserved_excluding(
        &self,
        kind: B,
        now: DateTime<Utc>,
        excluded: Option<ReservationId>,
    ) -> Decimal {
        self.reservations
            .iter()
            .filter(|r| r.is_active(now) && r.balance_type.overlaps(kind))
            .filter(|r| Some(r.id) != excluded)
            .map(|r| r.amount)
            .sum()
    }

    /// Balance minus active reservations. Buckets past their deadline count
    /// as empty.
    #[must_use]
    pub fn available(&self, kind: B, now: DateTime<Utc>) -> Decimal {
        self.wallet.sheet.usable_balance(kind, now.date_naive()) - self.reserved(kind, now)
    }

    /// Sum of line amounts of one entry type on one bucket.
    #[must_use]
    pub fn total_of(&self, entry_type: LedgerEntryType, bucket: B) -> Decimal {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type && e.balance_type == bucket)
            .map(|e| e.amount)
            .sum()
    }

    /// Distinct postings of an entry type carrying the reference, oldest first.
    #[must_use]
    pub fn postings_for(&self, entry_type: LedgerEntryType, reference: &Reference) -> Vec<PostingId> {
        postings_for(&self.entries, entry_type, reference)
    }

    /// The usage posting of the reference that has not been reversed yet.
    #[must_use]
    pub fn active_usage(&self, reference: &Reference) -> Option<PostingId> {
        active_usage(&self.entries, reference)
    }

    /// Lines of a posting.
    #[must_use]
    pub fn posting(&self, posting_id: PostingId) -> Option<Posting<B>> {
        Posting::from_lines(
            self.entries
                .iter()
                .filter(|e| e.posting_id == posting_id)
                .cloned()
                .collect(),
        )
    }

    /// Latest reservation created for a reference.
    #[must_use]
    pub fn latest_reservation(&self, reference_id: &str) -> Option<&Reservation<B>> {
        self.reservations
            .iter()
            .filter(|r| r.leave_request_id == reference_id)
            .max_by_key(|r| r.created_at)
    }

    /// Sum of remaining amounts of additive lines per bucket.
    #[must_use]
    pub fn remaining_by_bucket(&self) -> BTreeMap<B, Decimal> {
        let mut totals: BTreeMap<B, Decimal> = B::concrete().map(|b| (b, Decimal::ZERO)).collect();
        for entry in self.entries.iter().filter(|e| e.is_additive()) {
            *totals.entry(entry.balance_type).or_default() += entry.remaining_amount;
        }
        totals
    }

    /// Counters rebuilt from the ledger.
    #[must_use]
    pub fn replayed_sheet(&self) -> BalanceSheet<B> {
        BalanceSheet::replay(&self.entries)
    }

    // ========== Wallet maintenance ==========

    /// Overwrites the counters with the ledger replay, keeping expiry dates.
    ///
    /// Returns the buckets that changed.
    pub fn resync_counters(&mut self) -> Vec<B> {
        let replayed = self.replayed_sheet();
        let changed = self.wallet.sheet.differing_buckets(&replayed);
        for bucket in &changed {
            let source = replayed.bucket(*bucket);
            let target = self.wallet.sheet.bucket_mut(*bucket);
            target.credited = source.credited;
            target.carried = source.carried;
            target.used = source.used;
        }
        changed
    }

    /// Sets an informational entitlement.
    pub fn set_entitlement(&mut self, bucket: B, amount: Decimal) {
        self.wallet.entitlements.insert(bucket, amount);
    }

    /// Closes the wallet. Returns false when it was already closed.
    pub fn close(&mut self) -> bool {
        if self.wallet.is_closed() {
            return false;
        }
        self.wallet.status = super::wallet::WalletStatus::Closed;
        true
    }

    // ========== Postings ==========

    /// Posts a transaction.
    ///
    /// Validation and sufficiency checks run before anything is written, so
    /// an error leaves the book untouched.
    pub fn post(
        &mut self,
        request: TransactionRequest<B>,
        now: DateTime<Utc>,
    ) -> Result<PostingOutcome<B>, WalletError> {
        self.post_excluding(request, now, None)
    }

    fn post_excluding(
        &mut self,
        request: TransactionRequest<B>,
        now: DateTime<Utc>,
        excluded: Option<ReservationId>,
    ) -> Result<PostingOutcome<B>, WalletError> {
        self.validate(&request)?;

        let lines = match request.transaction_type {
            TransactionType::Refund => match self.plan_refund(&request)? {
                Ok(lines) => lines,
                Err(outcome) => return Ok(outcome),
            },
            transaction_type => {
                if let Some(existing) = self.existing_posting(transaction_type, request.reference.as_ref()) {
                    return Ok(PostingOutcome::Duplicate(existing));
                }
                match transaction_type {
                    TransactionType::Deduction => self.plan_deduction(&request, now, excluded)?,
                    TransactionType::CarryOver => vec![PlannedLine {
                        bucket: request.balance_type.carry_bucket(),
                        amount: request.amount,
                    }],
                    _ => vec![PlannedLine {
                        bucket: request.balance_type.credit_bucket(),
                        amount: request.amount,
                    }],
                }
            }
        };

        Ok(PostingOutcome::Posted(self.write(&request, &lines, now)))
    }

    fn validate(&self, request: &TransactionRequest<B>) -> Result<(), WalletError> {
        let kind = request.balance_type;
        if request.transaction_type.is_signed() {
            if request.amount.is_zero() {
                return Err(WalletError::ZeroAmount);
            }
            check_precision(kind, request.amount)?;
        } else {
            check_positive(kind, request.amount)?;
        }

        if let Some(reference) = &request.reference {
            if reference.reference_id.trim().is_empty() {
                return Err(WalletError::EmptyReference);
            }
        }

        if self.wallet.is_closed() && request.transaction_type.blocked_when_closed() {
            return Err(self.wallet.closed_error());
        }
        Ok(())
    }

    /// Existing posting that makes the request a no-op.
    fn existing_posting(
        &self,
        transaction_type: TransactionType,
        reference: Option<&Reference>,
    ) -> Option<Posting<B>> {
        // accrual runs converge through deltas, not references
        let reference = reference.filter(|r| r.reference_type != ReferenceType::Accrual)?;
        let posting_id = if transaction_type == TransactionType::Deduction {
            self.active_usage(reference)?
        } else {
            *self
                .postings_for(transaction_type.entry_type(), reference)
                .last()?
        };
        self.posting(posting_id)
    }

    fn plan_deduction(
        &self,
        request: &TransactionRequest<B>,
        now: DateTime<Utc>,
        excluded: Option<ReservationId>,
    ) -> Result<Vec<PlannedLine<B>>, WalletError> {
        let kind = request.balance_type;
        let today = now.date_naive();
        if request.policy == SufficiencyPolicy::Enforce {
            let available =
                self.wallet.sheet.usable_balance(kind, today) - self.reserved_excluding(kind, now, excluded);
            if available < request.amount {
                return Err(WalletError::InsufficientBalance {
                    balance_type: kind.to_string(),
                    available,
                    requested: request.amount,
                });
            }
        }

        let buckets = kind.buckets();
        let mut left = request.amount;
        let mut lines = Vec::with_capacity(buckets.len());
        for (index, bucket) in buckets.iter().copied().enumerate() {
            if left <= Decimal::ZERO {
                break;
            }
            let take = if index + 1 == buckets.len() {
                left
            } else {
                self.wallet
                    .sheet
                    .bucket(bucket)
                    .usable(today)
                    .max(Decimal::ZERO)
                    .min(left)
            };
            if take > Decimal::ZERO {
                lines.push(PlannedLine {
                    bucket,
                    amount: -take,
                });
                left -= take;
            }
        }
        Ok(lines)
    }

    /// Lines of a refund, or the outcome to return when there is nothing to write.
    fn plan_refund(
        &self,
        request: &TransactionRequest<B>,
    ) -> Result<Result<Vec<PlannedLine<B>>, PostingOutcome<B>>, WalletError> {
        let Some(reference) = &request.reference else {
            return self.plan_restore(request).map(Ok);
        };

        match self.active_usage(reference) {
            Some(posting_id) => Ok(Ok(self
                .entries
                .iter()
                .filter(|e| e.posting_id == posting_id && e.entry_type == LedgerEntryType::Usage)
                .map(|e| PlannedLine {
                    bucket: e.balance_type,
                    amount: -e.amount,
                })
                .collect())),
            None => {
                let reversal = self
                    .postings_for(LedgerEntryType::Reversal, reference)
                    .last()
                    .and_then(|posting_id| self.posting(*posting_id));
                Ok(Err(reversal.map_or(PostingOutcome::Noop, PostingOutcome::Duplicate)))
            }
        }
    }

    /// Restores used balance without a reference, last bucket first.
    fn plan_restore(&self, request: &TransactionRequest<B>) -> Result<Vec<PlannedLine<B>>, WalletError> {
        let buckets = request.balance_type.buckets();
        let used: Decimal = buckets
            .iter()
            .map(|b| self.wallet.sheet.bucket(*b).used.max(Decimal::ZERO))
            .sum();
        if request.amount > used {
            return Err(WalletError::RefundExceedsUsage {
                used,
                requested: request.amount,
            });
        }

        let mut left = request.amount;
        let mut lines = Vec::new();
        for bucket in buckets.iter().rev().copied() {
            let give = self
                .wallet
                .sheet
                .bucket(bucket)
                .used
                .max(Decimal::ZERO)
                .min(left);
            if give > Decimal::ZERO {
                lines.push(PlannedLine { bucket, amount: give });
                left -= give;
            }
        }
        Ok(lines)
    }

    /// Writes planned lines: counters, FIFO draws, change set.
    fn write(
        &mut self,
        request: &TransactionRequest<B>,
        lines: &[PlannedLine<B>],
        now: DateTime<Utc>,
    ) -> Posting<B> {
        let entry_type = request.transaction_type.entry_type();
        let mut posting = Posting {
            posting_id: PostingId::new(),
            entry_type,
            lines: Vec::with_capacity(lines.len()),
            draws: Vec::new(),
            warnings: Vec::new(),
        };

        for line in lines {
            let mut entry = LedgerEntry {
                id: LedgerEntryId::new(),
                wallet_id: self.wallet.id,
                year: self.wallet.year,
                posting_id: posting.posting_id,
                entry_type,
                balance_type: line.bucket,
                amount: line.amount,
                remaining_amount: Decimal::ZERO,
                reference: request.reference.clone(),
                expiry_date: None,
                description: request.description.clone(),
                created_by: request.created_by,
                created_at: now,
            };

            if line.amount > Decimal::ZERO {
                entry.remaining_amount = line.amount;
                entry.expiry_date = request
                    .expiry_date
                    .or(self.wallet.sheet.bucket(line.bucket).expiry_date);
            } else {
                let requested = -line.amount;
                let consumption = self.consume(line.bucket, requested, now.date_naive());
                if !consumption.is_complete() {
                    posting.warnings.push(PostingWarning::BucketShortfall {
                        balance_type: line.bucket,
                        requested,
                        covered: consumption.consumed,
                        shortfall: consumption.shortfall,
                    });
                }
                posting.draws.extend(consumption.draws);
            }

            self.wallet.sheet.apply(entry_type, line.bucket, line.amount);
            if entry_type == LedgerEntryType::CarryOver {
                if let Some(expiry) = request.expiry_date {
                    self.wallet.sheet.bucket_mut(line.bucket).expiry_date = Some(expiry);
                }
            }

            self.entries.push(entry.clone());
            self.changes.entries.push(entry.clone());
            posting.lines.push(entry);
        }

        self.changes.draws.extend(posting.draws.iter().copied());
        posting
    }

    /// Runs the FIFO consumer over the bucket's additive lines.
    fn consume(&mut self, bucket: B, amount: Decimal, on: NaiveDate) -> Consumption {
        let mut views: Vec<BucketEntry> = self
            .entries
            .iter()
            .filter(|e| e.balance_type == bucket && e.is_additive() && e.remaining_amount > Decimal::ZERO)
            .map(BucketEntry::from_entry)
            .collect();

        let consumption = BucketConsumer::consume(&mut views, amount, on);
        for draw in &consumption.draws {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.id == draw.entry_id) {
                entry.remaining_amount = draw.remaining_after;
            }
        }
        consumption
    }

    // ========== Reservations ==========

    /// Marks pending reservations past their expiry as `EXPIRED`.
    ///
    /// Returns the number of reservations expired.
    pub fn expire_reservations(&mut self, now: DateTime<Utc>) -> usize {
        let mut expired = 0;
        for reservation in &mut self.reservations {
            if !reservation.is_stale(now) {
                continue;
            }
            if let Ok(transition) = reservation.resolve(ReservationStatus::Expired, now, None) {
                self.changes.transitions.push(transition);
                expired += 1;
            }
        }
        expired
    }

    /// Holds balance for a leave request.
    ///
    /// Re-reserving a reference with an active hold returns that hold.
    pub fn reserve(
        &mut self,
        request: ReserveRequest<B>,
        now: DateTime<Utc>,
    ) -> Result<ReserveOutcome<B>, WalletError> {
        check_positive(request.balance_type, request.amount)?;
        if request.reference_id.trim().is_empty() {
            return Err(WalletError::EmptyReference);
        }
        if request.expires_at <= now {
            return Err(WalletError::InvalidExpiry);
        }
        if self.wallet.is_closed() {
            return Err(self.wallet.closed_error());
        }

        self.expire_reservations(now);

        if let Some(existing) = self
            .reservations
            .iter()
            .find(|r| r.leave_request_id == request.reference_id && r.status == ReservationStatus::Pending)
        {
            return Ok(ReserveOutcome::Existing(existing.clone()));
        }

        let available = self.available(request.balance_type, now);
        if available < request.amount {
            return Err(WalletError::InsufficientBalance {
                balance_type: request.balance_type.to_string(),
                available,
                requested: request.amount,
            });
        }

        let reservation = Reservation {
            id: ReservationId::new(),
            wallet_id: self.wallet.id,
            user_id: self.wallet.user_id,
            year: self.wallet.year,
            leave_request_id: request.reference_id,
            balance_type: request.balance_type,
            amount: request.amount,
            status: ReservationStatus::Pending,
            expires_at: request.expires_at,
            posting_id: None,
            created_at: now,
            resolved_at: None,
        };
        self.reservations.push(reservation.clone());
        self.changes.reservations.push(reservation.clone());
        Ok(ReserveOutcome::Created(reservation))
    }

    /// Confirms the pending reservation of a reference and posts its usage.
    ///
    /// Sufficiency is re-validated with the reservation's own hold excluded.
    /// When a usage for the reference already exists the reservation is
    /// confirmed without posting again.
    pub fn confirm(
        &mut self,
        reference_id: &str,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome<B>, WalletError> {
        self.expire_reservations(now);

        let Some(index) = self.pending_index(reference_id) else {
            return Ok(self
                .latest_reservation(reference_id)
                .cloned()
                .map_or(ConfirmOutcome::NoReservation, ConfirmOutcome::AlreadyResolved));
        };

        let reservation = self.reservations[index].clone();
        let reference = Reference::leave_request(reference_id)?.with_status(APPROVED_STATUS);

        let (posting_id, posting) = if let Some(existing) = self.active_usage(&reference) {
            (existing, None)
        } else {
            let mut request = TransactionRequest::new(
                TransactionType::Deduction,
                reservation.balance_type,
                reservation.amount,
            )
            .with_reference(reference)
            .with_description("Reservation confirmed");
            request.created_by = actor;

            match self.post_excluding(request, now, Some(reservation.id))? {
                PostingOutcome::Posted(posting) => (posting.posting_id, Some(posting)),
                PostingOutcome::Duplicate(posting) => (posting.posting_id, None),
                PostingOutcome::Noop => {
                    return Err(WalletError::Internal(format!(
                        "deduction for {reference_id} produced no posting"
                    )));
                }
            }
        };

        let transition =
            self.reservations[index].resolve(ReservationStatus::Confirmed, now, Some(posting_id))?;
        self.changes.transitions.push(transition);

        Ok(ConfirmOutcome::Confirmed {
            reservation: self.reservations[index].clone(),
            posting,
        })
    }

    /// Releases the pending reservation of a reference.
    pub fn cancel(
        &mut self,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CancelOutcome<B>, WalletError> {
        self.expire_reservations(now);

        let Some(index) = self.pending_index(reference_id) else {
            return Ok(self
                .latest_reservation(reference_id)
                .cloned()
                .map_or(CancelOutcome::NoReservation, CancelOutcome::AlreadyResolved));
        };

        let transition = self.reservations[index].resolve(ReservationStatus::Cancelled, now, None)?;
        self.changes.transitions.push(transition);
        Ok(CancelOutcome::Cancelled(self.reservations[index].clone()))
    }

    fn pending_index(&self, reference_id: &str) -> Option<usize> {
        self.reservations
            .iter()
            .position(|r| r.leave_request_id == reference_id && r.status == ReservationStatus::Pending)
    }
}

/// Distinct postings of an entry type carrying the reference among the
/// lines of one wallet, oldest first.
#[must_use]
pub fn postings_for<B: BalanceKind>(
    entries: &[LedgerEntry<B>],
    entry_type: LedgerEntryType,
    reference: &Reference,
) -> Vec<PostingId> {
    let mut postings: Vec<PostingId> = Vec::new();
    for entry in entries {
        if entry.entry_type == entry_type
            && entry.refers_to(reference)
            && !postings.contains(&entry.posting_id)
        {
            postings.push(entry.posting_id);
        }
    }
    postings
}

/// The unreversed usage posting of the reference among the lines of one wallet.
#[must_use]
pub fn active_usage<B: BalanceKind>(entries: &[LedgerEntry<B>], reference: &Reference) -> Option<PostingId> {
    let usages = postings_for(entries, LedgerEntryType::Usage, reference);
    let reversals = postings_for(entries, LedgerEntryType::Reversal, reference);
    if usages.len() > reversals.len() {
        usages.last().copied()
    } else {
        None
    }
}
