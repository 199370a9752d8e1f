//! XML year-file format.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <bills>
//!   <bill>
//!     <name>Rent</name>
//!     <date_due>01/03/2024</date_due>
//!     <amount>950.0</amount>
//!     <bank_account>Wayne</bank_account>
//!     <date_started>20/02/2024</date_started>
//!     <date_changed>20/02/2024</date_changed>
//!     <previous_amount>0.0</previous_amount>
//!     <notes> </notes>
//!     <month>March</month>
//!   </bill>
//! </bills>
//! ```
//!
//! Reading is split in two: [`BillParser`] is a pure state machine over
//! [`Token`]s, and [`read_ledger`] drives it from a quick-xml event stream.
//! Any malformed bill aborts the whole read.

use std::{
    io::{self, BufRead, Write},
    mem,
};

use chrono::NaiveDate;
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    errors::LedgerError,
    ledger::{bill::normalize_notes, BillRecord, MonthlyLedger, BLANK_NOTES, NO_ACCOUNT},
};

pub const ROOT_TAG: &str = "bills";
pub const BILL_TAG: &str = "bill";
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Child elements of a bill element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    DateDue,
    Amount,
    BankAccount,
    DateStarted,
    DateChanged,
    PreviousAmount,
    Notes,
    Month,
    Selected,
}

impl Field {
    /// Fields written for every bill, in file order. `selected` is read when
    /// present but never written.
    pub const WRITE_ORDER: [Field; 9] = [
        Field::Name,
        Field::DateDue,
        Field::Amount,
        Field::BankAccount,
        Field::DateStarted,
        Field::DateChanged,
        Field::PreviousAmount,
        Field::Notes,
        Field::Month,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::DateDue => "date_due",
            Field::Amount => "amount",
            Field::BankAccount => "bank_account",
            Field::DateStarted => "date_started",
            Field::DateChanged => "date_changed",
            Field::PreviousAmount => "previous_amount",
            Field::Notes => "notes",
            Field::Month => "month",
            Field::Selected => "selected",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::WRITE_ORDER
            .into_iter()
            .chain([Field::Selected])
            .find(|field| field.tag() == tag)
    }
}

/// Markup units consumed by [`BillParser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Open(&'a str),
    Text(&'a str),
    Close(&'a str),
}

/// Field values collected between a bill's open and close markers.
#[derive(Debug, Default)]
struct PartialBill {
    name: Option<String>,
    due_date: Option<NaiveDate>,
    amount: Option<f64>,
    account: Option<String>,
    date_started: Option<NaiveDate>,
    date_changed: Option<NaiveDate>,
    previous_amount: Option<f64>,
    notes: Option<String>,
    month: Option<String>,
    selected: Option<bool>,
}

impl PartialBill {
    fn set(&mut self, field: Field, text: String) -> Result<(), String> {
        match field {
            Field::Name => self.name = Some(text),
            Field::DateDue => self.due_date = Some(parse_date(field, &text)?),
            Field::Amount => self.amount = Some(parse_amount(field, &text)?),
            Field::BankAccount => self.account = Some(text),
            Field::DateStarted => self.date_started = Some(parse_date(field, &text)?),
            Field::DateChanged => self.date_changed = Some(parse_date(field, &text)?),
            Field::PreviousAmount => self.previous_amount = Some(parse_amount(field, &text)?),
            Field::Notes => self.notes = Some(text),
            Field::Month => self.month = Some(text),
            Field::Selected => {
                self.selected = Some(match text.trim() {
                    "true" => true,
                    "false" => false,
                    other => return Err(format!("selected `{}` is not true/false", other)),
                })
            }
        }
        Ok(())
    }

    fn build(self) -> Result<BillRecord, String> {
        let name = required(self.name, Field::Name)?;
        if name.trim().is_empty() {
            return Err("name is empty".into());
        }
        let month = required(self.month, Field::Month)?;
        if month.trim().is_empty() {
            return Err("month is empty".into());
        }
        let date_started = required(self.date_started, Field::DateStarted)?;
        let date_changed = required(self.date_changed, Field::DateChanged)?;
        if date_changed < date_started {
            return Err(format!(
                "date_changed {} precedes date_started {}",
                date_changed.format(DATE_FORMAT),
                date_started.format(DATE_FORMAT)
            ));
        }
        Ok(BillRecord {
            id: Uuid::new_v4(),
            name,
            due_date: required(self.due_date, Field::DateDue)?,
            amount: required(self.amount, Field::Amount)?,
            account: self
                .account
                .filter(|account| !account.trim().is_empty())
                .unwrap_or_else(|| NO_ACCOUNT.to_string()),
            notes: normalize_notes(self.notes.unwrap_or_default()),
            date_started,
            date_changed,
            previous_amount: self.previous_amount.unwrap_or(0.0),
            month,
            selected: self.selected.unwrap_or(true),
        })
    }
}

fn required<T>(value: Option<T>, field: Field) -> Result<T, String> {
    value.ok_or_else(|| format!("missing <{}>", field.tag()))
}

fn parse_date(field: Field, text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| format!("{} `{}` is not a dd/MM/yyyy date", field.tag(), text))
}

fn parse_amount(field: Field, text: &str) -> Result<f64, String> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(format!(
            "{} `{}` is not a non-negative number",
            field.tag(),
            text
        )),
    }
}

#[derive(Debug)]
enum State {
    AwaitingBill,
    AwaitingField(PartialBill),
    ReadingField {
        bill: PartialBill,
        field: Option<Field>,
        tag: String,
        text: String,
    },
}

/// Rebuilds bill records from a token stream.
///
/// States: awaiting a bill, awaiting the next field of an open bill, and
/// reading a field's text. Unknown child elements of a bill are skipped.
/// The first malformed value yields [`LedgerError::CorruptRecord`].
#[derive(Debug)]
pub struct BillParser {
    state: State,
    bills_seen: usize,
}

impl Default for BillParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BillParser {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingBill,
            bills_seen: 0,
        }
    }

    /// Ordinal of the bill currently (or most recently) being read.
    pub fn bills_seen(&self) -> usize {
        self.bills_seen
    }

    /// Advances the state machine; returns a record when a bill closes.
    pub fn feed(&mut self, token: Token<'_>) -> Result<Option<BillRecord>, LedgerError> {
        let state = mem::replace(&mut self.state, State::AwaitingBill);
        let (next, finished) = match (state, token) {
            (State::AwaitingBill, Token::Open(BILL_TAG)) => {
                self.bills_seen += 1;
                (State::AwaitingField(PartialBill::default()), None)
            }
            (State::AwaitingBill, _) => (State::AwaitingBill, None),

            (State::AwaitingField(bill), Token::Open(tag)) => {
                if tag == BILL_TAG {
                    return Err(self.corrupt("bill element nested inside a bill"));
                }
                let field = Field::from_tag(tag);
                if field.is_none() {
                    debug!(tag, bill = self.bills_seen, "skipping unknown bill element");
                }
                let state = State::ReadingField {
                    bill,
                    field,
                    tag: tag.to_string(),
                    text: String::new(),
                };
                (state, None)
            }
            (State::AwaitingField(bill), Token::Text(text)) => {
                if !text.trim().is_empty() {
                    return Err(self.corrupt(format!("unexpected text `{}`", text.trim())));
                }
                (State::AwaitingField(bill), None)
            }
            (State::AwaitingField(bill), Token::Close(BILL_TAG)) => {
                let record = bill.build().map_err(|reason| self.corrupt(reason))?;
                (State::AwaitingBill, Some(record))
            }
            (State::AwaitingField(_), Token::Close(tag)) => {
                return Err(self.corrupt(format!("unexpected </{}>", tag)));
            }

            (
                State::ReadingField {
                    bill,
                    field,
                    tag,
                    mut text,
                },
                Token::Text(chunk),
            ) => {
                text.push_str(chunk);
                let state = State::ReadingField {
                    bill,
                    field,
                    tag,
                    text,
                };
                (state, None)
            }
            (
                State::ReadingField {
                    mut bill,
                    field,
                    tag,
                    text,
                },
                Token::Close(closing),
            ) => {
                if closing != tag {
                    return Err(self.corrupt(format!("<{}> closed by </{}>", tag, closing)));
                }
                if let Some(field) = field {
                    bill.set(field, text).map_err(|reason| self.corrupt(reason))?;
                }
                (State::AwaitingField(bill), None)
            }
            (State::ReadingField { tag, .. }, Token::Open(inner)) => {
                return Err(self.corrupt(format!("<{}> nested inside <{}>", inner, tag)));
            }
        };
        self.state = next;
        Ok(finished)
    }

    /// Checks that the stream did not end in the middle of a bill.
    pub fn finish(self) -> Result<(), LedgerError> {
        match self.state {
            State::AwaitingBill => Ok(()),
            _ => Err(LedgerError::corrupt(
                self.bills_seen,
                "file ends inside a bill element",
            )),
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::corrupt(self.bills_seen, reason)
    }
}

/// Reads a whole ledger. Nothing is returned unless every bill parses.
pub fn read_ledger<R: BufRead>(source: R) -> Result<MonthlyLedger, LedgerError> {
    let mut reader = Reader::from_reader(source);
    let mut parser = BillParser::new();
    let mut ledger = MonthlyLedger::default();
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|err| malformed(&parser, err))?;
        match event {
            Event::Start(element) => {
                let local = element.local_name();
                let name = element_name(&parser, local.as_ref())?;
                feed(&mut parser, &mut ledger, Token::Open(name))?;
            }
            Event::Empty(element) => {
                let local = element.local_name();
                let name = element_name(&parser, local.as_ref())?;
                feed(&mut parser, &mut ledger, Token::Open(name))?;
                feed(&mut parser, &mut ledger, Token::Close(name))?;
            }
            Event::End(element) => {
                let local = element.local_name();
                let name = element_name(&parser, local.as_ref())?;
                feed(&mut parser, &mut ledger, Token::Close(name))?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| malformed(&parser, err))?;
                feed(&mut parser, &mut ledger, Token::Text(&text))?;
            }
            Event::CData(data) => {
                let text = std::str::from_utf8(&data)
                    .map_err(|_| parser.corrupt("CDATA is not valid UTF-8"))?;
                feed(&mut parser, &mut ledger, Token::Text(text))?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    parser.finish()?;
    Ok(ledger)
}

fn feed(
    parser: &mut BillParser,
    ledger: &mut MonthlyLedger,
    token: Token<'_>,
) -> Result<(), LedgerError> {
    if let Some(record) = parser.feed(token)? {
        ledger.place_loaded(record);
    }
    Ok(())
}

fn element_name<'a>(parser: &BillParser, raw: &'a [u8]) -> Result<&'a str, LedgerError> {
    std::str::from_utf8(raw).map_err(|_| parser.corrupt("element name is not valid UTF-8"))
}

fn malformed(parser: &BillParser, err: quick_xml::Error) -> LedgerError {
    parser.corrupt(format!("malformed XML: {}", err))
}

/// Writes every bill of every month, months in insertion order.
pub fn write_ledger<W: Write>(sink: W, ledger: &MonthlyLedger) -> io::Result<()> {
    let mut writer = Writer::new_with_indent(sink, b'\t', 1);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_error)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_TAG)))
        .map_err(io_error)?;
    for (_, bills) in ledger.iter() {
        for bill in bills {
            write_bill(&mut writer, bill).map_err(io_error)?;
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT_TAG)))
        .map_err(io_error)?;
    writer.into_inner().write_all(b"\n")?;
    Ok(())
}

fn write_bill<W: Write>(writer: &mut Writer<W>, bill: &BillRecord) -> Result<(), quick_xml::Error> {
    writer.write_event(Event::Start(BytesStart::new(BILL_TAG)))?;
    for field in Field::WRITE_ORDER {
        let value = field_text(bill, field);
        writer.write_event(Event::Start(BytesStart::new(field.tag())))?;
        writer.write_event(Event::Text(BytesText::new(&value)))?;
        writer.write_event(Event::End(BytesEnd::new(field.tag())))?;
    }
    writer.write_event(Event::End(BytesEnd::new(BILL_TAG)))?;
    Ok(())
}

fn field_text(bill: &BillRecord, field: Field) -> String {
    match field {
        Field::Name => bill.name.clone(),
        Field::DateDue => bill.due_date.format(DATE_FORMAT).to_string(),
        Field::Amount => amount_text(bill.amount),
        Field::BankAccount => bill.account.clone(),
        Field::DateStarted => bill.date_started.format(DATE_FORMAT).to_string(),
        Field::DateChanged => bill.date_changed.format(DATE_FORMAT).to_string(),
        Field::PreviousAmount => amount_text(bill.previous_amount),
        Field::Notes => {
            if bill.notes.trim().is_empty() {
                BLANK_NOTES.to_string()
            } else {
                bill.notes.clone()
            }
        }
        Field::Month => bill.month.clone(),
        Field::Selected => bill.selected.to_string(),
    }
}

/// Shortest text that parses back to the same value, always with a
/// fractional part (`950.0`).
fn amount_text(amount: f64) -> String {
    format!("{:?}", amount)
}

fn io_error(err: quick_xml::Error) -> io::Error {
    match &err {
        quick_xml::Error::Io(inner) => io::Error::new(inner.kind(), err.to_string()),
        _ => io::Error::new(io::ErrorKind::Other, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::BillFields;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn feed_all(parser: &mut BillParser, tokens: &[Token<'_>]) -> Result<Vec<BillRecord>, LedgerError> {
        let mut records = Vec::new();
        for token in tokens {
            if let Some(record) = parser.feed(*token)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn field_tokens<'a>(pairs: &[(&'a str, &'a str)]) -> Vec<Token<'a>> {
        let mut tokens = vec![Token::Open(ROOT_TAG), Token::Open(BILL_TAG)];
        for &(tag, value) in pairs {
            tokens.push(Token::Open(tag));
            tokens.push(Token::Text(value));
            tokens.push(Token::Close(tag));
        }
        tokens.push(Token::Close(BILL_TAG));
        tokens.push(Token::Close(ROOT_TAG));
        tokens
    }

    const RENT: [(&str, &str); 9] = [
        ("name", "Rent"),
        ("date_due", "01/03/2024"),
        ("amount", "950.0"),
        ("bank_account", "Wayne"),
        ("date_started", "20/02/2024"),
        ("date_changed", "20/02/2024"),
        ("previous_amount", "0.0"),
        ("notes", " "),
        ("month", "March"),
    ];

    #[test]
    fn parser_builds_record_on_close() {
        let mut parser = BillParser::new();
        let records = feed_all(&mut parser, &field_tokens(&RENT)).unwrap();
        parser.finish().unwrap();

        assert_eq!(records.len(), 1);
        let rent = &records[0];
        assert_eq!(rent.name, "Rent");
        assert_eq!(rent.due_date, date(2024, 3, 1));
        assert_eq!(rent.amount, 950.0);
        assert_eq!(rent.account, "Wayne");
        assert_eq!(rent.month, "March");
        assert_eq!(rent.notes, BLANK_NOTES);
        assert!(rent.selected);
    }

    #[test]
    fn parser_rejects_non_numeric_amount() {
        let mut fields = RENT;
        fields[2] = ("amount", "nine fifty");
        let mut parser = BillParser::new();
        let err = feed_all(&mut parser, &field_tokens(&fields)).unwrap_err();
        match err {
            LedgerError::CorruptRecord { bill, reason } => {
                assert_eq!(bill, 1);
                assert!(reason.contains("amount"), "unexpected reason: {reason}");
            }
            other => panic!("expected corrupt record, got {other:?}"),
        }
    }

    #[test]
    fn parser_rejects_malformed_dates_and_negative_amounts() {
        let mut bad_date = RENT;
        bad_date[1] = ("date_due", "2024-03-01");
        let mut parser = BillParser::new();
        assert!(matches!(
            feed_all(&mut parser, &field_tokens(&bad_date)),
            Err(LedgerError::CorruptRecord { .. })
        ));

        let mut negative = RENT;
        negative[2] = ("amount", "-5.0");
        let mut parser = BillParser::new();
        assert!(matches!(
            feed_all(&mut parser, &field_tokens(&negative)),
            Err(LedgerError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn parser_requires_month_and_defaults_optional_fields() {
        let without_month: Vec<_> = RENT.iter().copied().filter(|(tag, _)| *tag != "month").collect();
        let mut parser = BillParser::new();
        let err = feed_all(&mut parser, &field_tokens(&without_month)).unwrap_err();
        assert!(err.to_string().contains("missing <month>"), "{err}");

        let minimal: Vec<_> = RENT
            .iter()
            .copied()
            .filter(|(tag, _)| !matches!(*tag, "bank_account" | "previous_amount" | "notes"))
            .collect();
        let mut parser = BillParser::new();
        let records = feed_all(&mut parser, &field_tokens(&minimal)).unwrap();
        assert_eq!(records[0].account, NO_ACCOUNT);
        assert_eq!(records[0].previous_amount, 0.0);
        assert_eq!(records[0].notes, BLANK_NOTES);
    }

    #[test]
    fn parser_skips_unknown_elements_and_reads_selected() {
        let mut fields: Vec<_> = RENT.to_vec();
        fields.push(("year", "2024"));
        fields.push(("selected", "false"));
        let mut parser = BillParser::new();
        let records = feed_all(&mut parser, &field_tokens(&fields)).unwrap();
        assert!(!records[0].selected);
    }

    #[test]
    fn parser_rejects_structural_errors() {
        let mut parser = BillParser::new();
        let err = feed_all(
            &mut parser,
            &[Token::Open(BILL_TAG), Token::Open("name"), Token::Close("notes")],
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::CorruptRecord { bill: 1, .. }));

        let mut parser = BillParser::new();
        feed_all(&mut parser, &[Token::Open(BILL_TAG), Token::Open("name")]).unwrap();
        assert!(parser.finish().is_err());

        let mut parser = BillParser::new();
        let err = feed_all(&mut parser, &[Token::Open(BILL_TAG), Token::Open(BILL_TAG)]).unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn written_bill_keeps_field_order_and_reads_back() {
        let mut ledger = MonthlyLedger::new("2024");
        ledger.add_month("March").unwrap();
        let fields = BillFields::new("Rent & Rates", date(2024, 3, 1), 950.0)
            .with_account("Wayne")
            .with_notes("  paid <early> ");
        ledger
            .add_record("March", BillRecord::new(fields, date(2024, 2, 20)))
            .unwrap();

        let mut out = Vec::new();
        write_ledger(&mut out, &ledger).unwrap();
        let xml = String::from_utf8(out.clone()).unwrap();

        let positions: Vec<usize> = Field::WRITE_ORDER
            .iter()
            .map(|field| xml.find(&format!("<{}>", field.tag())).expect("field written"))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(xml.contains("<amount>950.0</amount>"));
        assert!(xml.contains("<date_due>01/03/2024</date_due>"));
        assert!(!xml.contains("<selected>"));

        let loaded = read_ledger(out.as_slice()).unwrap();
        assert_eq!(loaded.bills("March"), ledger.bills("March"));
        assert_eq!(loaded.bills("March")[0].notes, "  paid <early> ");
    }

    #[test]
    fn reads_empty_and_self_closing_elements() {
        let xml = "<?xml version=\"1.0\"?>\n<bills/>";
        assert!(read_ledger(xml.as_bytes()).unwrap().is_empty());

        let xml = "<bills><bill><name>Gas</name><date_due>05/01/2024</date_due>\
                   <amount>20</amount><bank_account/><date_started>01/01/2024</date_started>\
                   <date_changed>01/01/2024</date_changed><notes></notes>\
                   <month>January</month></bill></bills>";
        let ledger = read_ledger(xml.as_bytes()).unwrap();
        let gas = &ledger.bills("January")[0];
        assert_eq!(gas.account, NO_ACCOUNT);
        assert_eq!(gas.notes, BLANK_NOTES);
        assert_eq!(gas.amount, 20.0);
    }

    #[test]
    fn malformed_markup_is_corrupt() {
        let xml = "<bills><bill><name>Gas</bill></bills>";
        assert!(matches!(
            read_ledger(xml.as_bytes()),
            Err(LedgerError::CorruptRecord { .. })
        ));
    }
}
