use serde::{Deserialize, Serialize};

use gradedesk_core::domain::admin::AdminRecord;
use gradedesk_core::domain::grade::{GradeRecord, END_SENTINEL};
use gradedesk_core::domain::identity::Identity;
use gradedesk_core::domain::roster::{navigation_token, RosterPage};
use gradedesk_core::flows::{MenuOption, Prompt};

/// Outbound message: text plus rows of selectable options. Selecting an
/// option sends its label back verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Vec<String>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), options: Vec::new() }
    }
}

#[derive(Default)]
pub struct ReplyBuilder {
    lines: Vec<String>,
    options: Vec<Vec<String>>,
}

impl ReplyBuilder {
    pub fn new(first_line: impl Into<String>) -> Self {
        Self { lines: vec![first_line.into()], options: Vec::new() }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn row<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row = labels.into_iter().map(Into::into).collect::<Vec<_>>();
        if !row.is_empty() {
            self.options.push(row);
        }
        self
    }

    pub fn menu(self) -> Self {
        let mut builder = self;
        for pair in MenuOption::ALL.chunks(2) {
            builder = builder.row(pair.iter().map(MenuOption::label));
        }
        builder
    }

    pub fn build(self) -> Reply {
        Reply { text: self.lines.join("\n"), options: self.options }
    }
}

pub fn render(prompt: &Prompt) -> Reply {
    match prompt {
        Prompt::AskGivenName => Reply::text("Please send your first name."),
        Prompt::AskFamilyName => Reply::text("Please send your last name."),
        Prompt::AskOwnPublicId => Reply::text("Please send your student number."),
        Prompt::Registered { public_id } => Reply::text(format!(
            "Registration complete. Your grades are filed under student number {public_id}."
        )),
        Prompt::RegistrationConflict => Reply::text(
            "Registration failed: this account or student number is already registered.",
        ),
        Prompt::AdminMenu => ReplyBuilder::new("Admin panel. Choose an option.").menu().build(),
        Prompt::InvalidMenuOption => {
            ReplyBuilder::new("Invalid option. Choose one of the menu entries.").menu().build()
        }
        Prompt::AskCourse => Reply::text("Send the course name."),
        Prompt::AskStudentPublicId => Reply::text("Send the student number."),
        Prompt::AskGradeValue => Reply::text("Send the new grade."),
        Prompt::AskGradeLines { course } => ReplyBuilder::new(format!(
            "Send grades for {course}, one `<student number> <grade>` per line."
        ))
        .line(format!("Send {END_SENTINEL} when you are done."))
        .build(),
        Prompt::GradesProgress { saved, total } => Reply::text(format!(
            "Saved {saved} grade(s), {total} so far. Send more lines or {END_SENTINEL}."
        )),
        Prompt::GradesCompleted { course, total } => {
            ReplyBuilder::new(format!("Finished {course}: {total} grade(s) saved."))
                .menu()
                .build()
        }
        Prompt::GradeUpdated { public_id, course, value } => {
            ReplyBuilder::new(format!("Grade for {public_id} in {course} set to {value}."))
                .menu()
                .build()
        }
        Prompt::GradeDeleted { public_id, course } => {
            Reply::text(format!("Grade for {public_id} in {course} deleted."))
        }
        Prompt::CourseDeleted { course, rows } => {
            Reply::text(format!("Course {course} deleted ({rows} grade(s) removed)."))
        }
        Prompt::StudentDeleted { public_id } => {
            Reply::text(format!("Student {public_id} and their grades were deleted."))
        }
        Prompt::Roster(page) => roster(page),
        Prompt::PanelClosed => Reply::text("Admin panel closed."),
        Prompt::Cancelled => Reply::text("Cancelled."),
    }
}

fn roster(page: &RosterPage) -> Reply {
    let mut builder = if page.students.is_empty() {
        ReplyBuilder::new("No students registered.")
    } else {
        page.numbered().fold(ReplyBuilder::new("Students:"), |builder, (position, student)| {
            builder.line(format!(
                "{position}. {} {}",
                student.public_id,
                student.display_name()
            ))
        })
    };
    builder = builder.line(format!("Total: {}", page.total));

    let navigation = page
        .previous_offset()
        .into_iter()
        .chain(page.next_offset())
        .map(navigation_token)
        .collect::<Vec<_>>();

    builder.row(navigation).menu().build()
}

pub fn help() -> Reply {
    ReplyBuilder::new("Available commands:")
        .line("/register - link your account to your student number")
        .line("/mygrades - show your grades")
        .line("/cancel - abandon the current dialogue")
        .line("/admin - open the admin panel (admins)")
        .line("/addadmin <id> - grant admin rights (admins)")
        .line("/removeadmin <id> - revoke admin rights (super-admin)")
        .line("/admins - list admins (admins)")
        .build()
}

pub fn no_active_dialogue() -> Reply {
    Reply::text("Nothing in progress. Send /help to see the available commands.")
}

pub fn busy() -> Reply {
    Reply::text("Still working on your earlier messages. Wait for a reply, then send this again.")
}

pub fn nothing_to_cancel() -> Reply {
    Reply::text("Nothing to cancel.")
}

pub fn not_registered() -> Reply {
    Reply::text("You are not registered yet. Send /register first.")
}

pub fn my_grades(grades: &[GradeRecord]) -> Reply {
    if grades.is_empty() {
        return Reply::text("No grades recorded yet.");
    }
    grades
        .iter()
        .fold(ReplyBuilder::new("Your grades:"), |builder, grade| {
            builder.line(format!("{}: {}", grade.course, grade.value))
        })
        .build()
}

pub fn admin_granted(target: Identity, inserted: bool) -> Reply {
    if inserted {
        Reply::text(format!("{target} is now an admin."))
    } else {
        Reply::text(format!("{target} is already an admin."))
    }
}

pub fn admin_revoked(target: Identity, removed: bool) -> Reply {
    if removed {
        Reply::text(format!("{target} is no longer an admin."))
    } else {
        Reply::text(format!("{target} was not an admin."))
    }
}

pub fn protected_principal(target: Identity) -> Reply {
    Reply::text(format!("{target} is the super-admin and cannot be removed."))
}

pub fn admin_list(admins: &[AdminRecord], super_admin: Identity) -> Reply {
    admins
        .iter()
        .fold(ReplyBuilder::new("Admins:"), |builder, admin| {
            if admin.identity == super_admin {
                builder.line(format!("{} (super-admin)", admin.identity))
            } else {
                builder.line(admin.identity.to_string())
            }
        })
        .build()
}

pub fn unsupported_command(verb: &str) -> Reply {
    Reply::text(format!("Unknown command /{verb}. Send /help to see the available commands."))
}

pub fn failure(message: &str, correlation_id: &str) -> Reply {
    ReplyBuilder::new(message).line(format!("Reference: {correlation_id}")).build()
}
