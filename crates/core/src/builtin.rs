//! The built-in catalog: the Vietnamese "Sơ yếu lý lịch" personal-history
//! form, in the dossier variants that share its template.
//!
//! Coordinates are measured on `so_yeu_ly_lich.pdf` (A4, top-left origin,
//! baseline `y`).

use crate::blueprint::{Blueprint, Catalog, Step};
use crate::error::FormError;
use crate::options;
use crate::schema::{ColumnSource, DateFormat, FieldSpec, GroupColumn, GroupSpec};
use crate::validation::{NamedPattern, Rule};

pub const TEMPLATE_FILE: &str = "so_yeu_ly_lich.pdf";

/// Vertical distance between table rows on page 2.
const ROW_HEIGHT: f32 = 21.5;

const MSG_MONTH_YEAR: &str = "Dùng định dạng MM/YYYY";
const MSG_END_AFTER_START: &str = "Ngày kết thúc phải sau ngày bắt đầu.";

fn span(from: &str, to: &str) -> GroupColumn {
    GroupColumn {
        x_offset: 0.0,
        source: ColumnSource::Span {
            from: from.into(),
            to: to.into(),
        },
    }
}

fn column(x_offset: f32, field: &str) -> GroupColumn {
    GroupColumn {
        x_offset,
        source: ColumnSource::Field {
            field: field.into(),
        },
    }
}

fn month_year(id: &str, label: &str, required: &str) -> FieldSpec {
    FieldSpec::date(id, label, DateFormat::MonthYear)
        .rule(Rule::required(required))
        .rule(Rule::pattern(NamedPattern::MonthYear, MSG_MONTH_YEAR))
}

pub fn fields() -> Vec<FieldSpec> {
    vec![
        // Page 1
        FieldSpec::text("full_name", "HỌ VÀ TÊN (viết hoa)")
            .at(0, 214.52, 179.88)
            .max_width(200.0)
            .rule(Rule::required("Vui lòng điền họ tên."))
            .rule(Rule::pattern(NamedPattern::FullName, "Họ tên phải viết hoa."))
            .rule(Rule::max_length(30, "Họ tên không được vượt quá 30 ký tự.")),
        FieldSpec::choice("gender", "Giới tính", options::GENDERS)
            .at(0, 436.02, 179.88)
            .rule(Rule::required_choice("Vui lòng chọn giới tính.")),
        FieldSpec::date("dob", "Ngày sinh", DateFormat::Iso)
            .split_date(0, [152.52, 202.02, 242.02], 201.5)
            .rule(Rule::required("Vui lòng điền ngày sinh."))
            .rule(Rule::date_until_today()),
        FieldSpec::choice("birth_place", "Nơi sinh", options::PROVINCES)
            .at(0, 332.06, 201.5)
            .max_width(200.0)
            .rule(Rule::required("Vui lòng chọn nơi sinh.")),
        FieldSpec::text("registered_address", "Địa chỉ hộ khẩu")
            .at(0, 259.06, 244.83)
            .max_width(290.0)
            .rule(Rule::required("Vui lòng điền địa chỉ hộ khẩu."))
            .rule(Rule::max_length(55, "Địa chỉ không được vượt quá 55 ký tự.")),
        FieldSpec::text("phone", "Số điện thoại")
            .at(0, 209.06, 287.46)
            .rule(Rule::required("Vui lòng điền số điện thoại."))
            .rule(Rule::pattern(NamedPattern::Phone, "Số điện thoại không hợp lệ."))
            .rule(Rule::max_length(10, "Số điện thoại phải có 10 chữ số.")),
        FieldSpec::choice("ethnicity", "Dân tộc", options::ETHNIC_GROUPS)
            .at(0, 150.06, 309.56)
            .max_width(140.0)
            .rule(Rule::required_choice("Vui lòng chọn dân tộc.")),
        FieldSpec::choice("religion", "Tôn giáo", options::RELIGIONS)
            .at(0, 312.06, 309.56)
            .max_width(230.0)
            .rule(Rule::required_choice("Vui lòng chọn tôn giáo.")),
        FieldSpec::choice(
            "education_high_school",
            "Lộ trình hoàn thành cấp ba",
            options::HIGH_SCHOOL,
        )
        .at(0, 202.56, 352.56)
        .rule(Rule::required_choice("Vui lòng chọn lộ trình học cấp ba.")),
        FieldSpec::choice("award", "Khen thưởng", options::AWARDS)
            .at(0, 222.06, 417.06)
            .max_width(140.0)
            .rule(Rule::required_choice("Vui lòng chọn khen thưởng.")),
        FieldSpec::text("discipline", "Kỷ luật")
            .at(0, 377.06, 417.06)
            .max_width(170.0)
            .rule(Rule::max_length(150, "Nội dung không được vượt quá 150 ký tự.")),
        // Training rows
        month_year("training_from", "Từ (MM/YYYY)", "Điền thời gian bắt đầu."),
        month_year("training_to", "Đến (MM/YYYY)", "Điền thời gian kết thúc.")
            .rule(Rule::after("training_from", MSG_END_AFTER_START)),
        FieldSpec::text("training_unit", "Tên trường/Cơ sở đào tạo")
            .max_width(130.0)
            .rule(Rule::required("Điền tên trường."))
            .rule(Rule::max_length(26, "Tên trường không được vượt quá 26 ký tự.")),
        FieldSpec::text("training_field", "Ngành học")
            .max_width(105.0)
            .rule(Rule::required("Điền ngành học."))
            .rule(Rule::max_length(21, "Ngành học không được vượt quá 21 ký tự.")),
        FieldSpec::choice("training_format", "Hình thức", options::EDUCATION_FORMATS),
        FieldSpec::choice("training_certificate", "Văn bằng/Chứng chỉ", options::DEGREES)
            .max_width(110.0),
        // Work rows
        month_year("work_from", "Từ (MM/YYYY)", "Điền thời gian bắt đầu."),
        month_year("work_to", "Đến (MM/YYYY)", "Điền thời gian kết thúc.")
            .rule(Rule::after("work_from", MSG_END_AFTER_START)),
        FieldSpec::text("work_unit", "Đơn vị công tác")
            .max_width(270.0)
            .rule(Rule::required("Điền đơn vị."))
            .rule(Rule::max_length(50, "Tên đơn vị không được vượt quá 50 ký tự.")),
        FieldSpec::choice("work_role", "Chức vụ", options::WORK_POSITIONS).max_width(150.0),
        // Page 2 tables
        FieldSpec::group(
            "training_dataframe",
            "Quá trình đào tạo",
            GroupSpec {
                row_fields: vec![
                    "training_from".into(),
                    "training_to".into(),
                    "training_unit".into(),
                    "training_field".into(),
                    "training_format".into(),
                    "training_certificate".into(),
                ],
                columns: vec![
                    span("training_from", "training_to"),
                    column(72.5, "training_unit"),
                    column(208.0, "training_field"),
                    column(315.8, "training_format"),
                    column(402.0, "training_certificate"),
                ],
                row_height: ROW_HEIGHT,
                capacity: 6,
                font_size: None,
            },
        )
        .at(1, 62.0, 234.0),
        FieldSpec::group(
            "work_dataframe",
            "Lịch sử làm việc",
            GroupSpec {
                row_fields: vec![
                    "work_from".into(),
                    "work_to".into(),
                    "work_unit".into(),
                    "work_role".into(),
                ],
                columns: vec![
                    span("work_from", "work_to"),
                    column(76.5, "work_unit"),
                    column(353.0, "work_role"),
                ],
                row_height: ROW_HEIGHT,
                capacity: 10,
                font_size: None,
            },
        )
        .at(1, 62.0, 414.0),
    ]
}

pub fn steps() -> Vec<Step> {
    vec![
        Step::new(
            "core_identity",
            "Thông tin cá nhân",
            "Thông tin định danh cơ bản của bạn.",
        )
        .fields(&["full_name", "gender", "dob", "birth_place"]),
        Step::new("background", "Dân tộc & Tôn giáo", "Dân tộc và tôn giáo của bạn.")
            .fields(&["ethnicity", "religion"]),
        Step::new(
            "contact",
            "Địa chỉ & liên lạc",
            "Địa chỉ và số điện thoại để liên lạc khi cần.",
        )
        .fields(&["registered_address", "phone"]),
        Step::new(
            "education",
            "Học vấn & Chuyên môn",
            "Quá trình học tập và đào tạo.",
        )
        .fields(&["education_high_school"])
        .repeat("training_dataframe"),
        Step::new(
            "work_history",
            "Quá trình Công tác",
            "Liệt kê quá trình làm việc, bắt đầu từ gần nhất.",
        )
        .repeat("work_dataframe"),
        Step::new(
            "awards",
            "Khen thưởng & Kỷ luật",
            "Thông tin về khen thưởng và kỷ luật (nếu có).",
        )
        .fields(&["award", "discipline"]),
        Step::new(
            "review",
            "Xem lại & Hoàn tất",
            "Kiểm tra lại toàn bộ thông tin và tạo file PDF.",
        ),
    ]
}

fn dossier(name: &str, title: &str, description: &str, gov_form_code: Option<&str>) -> Blueprint {
    Blueprint {
        name: name.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        gov_form_code: gov_form_code.map(str::to_string),
        template_file: TEMPLATE_FILE.to_string(),
        steps: steps(),
    }
}

/// The three dossiers differ in title and form code only. They print the
/// same personal-history page, so they walk the same steps; the family and
/// political sections that set the state forms apart are not collected.
pub fn blueprints() -> Vec<Blueprint> {
    vec![
        dossier(
            "so-yeu-ly-lich",
            "Hồ sơ Doanh nghiệp Tư nhân",
            "Sơ yếu lý lịch cho hồ sơ xin việc ở doanh nghiệp tư nhân.",
            None,
        ),
        dossier(
            "vien-chuc",
            "Hồ sơ Viên chức",
            "Hồ sơ chuẩn theo quy định cho viên chức.",
            Some("Mẫu HS02-VC/BNV (Thông tư 07/2019/TT-BNV)"),
        ),
        dossier(
            "bo-cong-an",
            "Hồ sơ Bộ Công an (BCA)",
            "Hồ sơ thẩm tra lý lịch theo mẫu của Bộ Công an.",
            Some("Mẫu A-BCA(X01)-2020"),
        ),
    ]
}

impl Catalog {
    pub fn builtin() -> Result<Self, FormError> {
        Catalog::new(fields(), blueprints())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::layout::{plan, LayoutDefaults};
    use crate::session::{Advance, Cursor, Sequencer};
    use crate::value::{FieldValue, Record};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| ((*k).into(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_builtin_catalog_is_complete() {
        let catalog = Catalog::builtin().unwrap();
        let names: Vec<&str> = catalog.registry.names().collect();
        assert_eq!(names, vec!["bo-cong-an", "so-yeu-ly-lich", "vien-chuc"]);
        for blueprint in catalog.registry.iter() {
            let specs = blueprint.field_specs(&catalog.schema).unwrap();
            assert_eq!(specs.len(), catalog.schema.len());
        }
    }

    #[test]
    fn test_dossiers_share_step_order() {
        let catalog = Catalog::builtin().unwrap();
        let expected = [
            "core_identity",
            "background",
            "contact",
            "education",
            "work_history",
            "awards",
            "review",
        ];
        for blueprint in catalog.registry.iter() {
            let names: Vec<&str> = blueprint.steps.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, expected, "{}", blueprint.name);
        }
        let codes: Vec<Option<&str>> = catalog
            .registry
            .iter()
            .map(|b| b.gov_form_code.as_deref())
            .collect();
        assert_eq!(codes.iter().filter(|c| c.is_some()).count(), 2);
    }

    #[test]
    fn test_builtin_full_session() {
        let catalog = Catalog::builtin().unwrap();
        let seq = Sequencer::new(&catalog, "so-yeu-ly-lich", today()).unwrap();
        let mut state = seq.start();

        let answers: Vec<(&str, FieldValue)> = vec![
            ("full_name", FieldValue::text("NGUYỄN VĂN A")),
            ("gender", FieldValue::text("Nam")),
            ("dob", FieldValue::text("1999-01-05")),
            ("birth_place", FieldValue::text("Hà Nội")),
            ("ethnicity", FieldValue::text("Kinh")),
            ("religion", FieldValue::text("Không")),
            ("registered_address", FieldValue::text("12 Láng Hạ, Đống Đa, Hà Nội")),
            ("phone", FieldValue::text("0987654321")),
            ("education_high_school", FieldValue::text("12/12")),
            (
                "training_dataframe",
                FieldValue::Rows(vec![record(&[
                    ("training_from", "09/2017"),
                    ("training_to", "06/2021"),
                    ("training_unit", "Đại học Bách khoa"),
                    ("training_field", "Cơ khí"),
                    ("training_format", "Chính quy"),
                    ("training_certificate", "Kỹ sư"),
                ])]),
            ),
            (
                "work_dataframe",
                FieldValue::Rows(vec![record(&[
                    ("work_from", "07/2021"),
                    ("work_to", "05/2025"),
                    ("work_unit", "Công ty TNHH ABC"),
                    ("work_role", "Kỹ sư"),
                ])]),
            ),
            ("award", FieldValue::text("Không có")),
            ("discipline", FieldValue::text("Không có")),
        ];

        let mut pending = answers.into_iter().peekable();
        while !state.is_complete() {
            let step = seq.current_step(&state).unwrap();
            while let Some((id, _)) = pending.peek() {
                if !step.collects(id) {
                    break;
                }
                let (id, value) = pending.next().unwrap();
                seq.set_value(&mut state, id, value).unwrap();
            }
            let outcome = seq.advance(&mut state).unwrap();
            assert!(matches!(outcome, Advance::Moved(_)), "{outcome:?}");
        }
        assert_eq!(state.cursor, Cursor::Complete);

        let request = seq.build_render_request(&state).unwrap();
        assert_eq!(request.template_file, TEMPLATE_FILE);

        let plan = plan(&request, &LayoutDefaults::default());
        assert!(plan.warnings.is_empty());
        let dob: Vec<&str> = plan
            .stamps
            .iter()
            .filter(|s| s.field.as_str() == "dob")
            .map(|s| s.text.as_str())
            .collect();
        assert_eq!(dob, vec!["05", "01", "1999"]);
        assert!(plan
            .stamps
            .iter()
            .any(|s| s.text == "09/2017 - 06/2021" && s.page == 1 && s.y == 234.0));
    }

    #[test]
    fn test_builtin_rejects_lowercase_name() {
        let catalog = Catalog::builtin().unwrap();
        let seq = Sequencer::new(&catalog, "so-yeu-ly-lich", today()).unwrap();
        let mut state = seq.start();
        seq.set_value(&mut state, "full_name", FieldValue::text("Nguyen Van A"))
            .unwrap();
        let Advance::Blocked(violations) = seq.advance(&mut state).unwrap() else {
            panic!("expected the step to be blocked");
        };
        assert_eq!(violations[0].message, "Họ tên phải viết hoa.");
        assert_eq!(violations.len(), 4);
    }
}
